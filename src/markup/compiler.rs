//! Markup compiler
//!
//! Turns a [`Node`] tree into widgets of a [`WidgetTree`], expanding
//! registered components on the way and collecting style rules, action
//! bindings and script sources. Scripts are only collected here; scopes are
//! created and populated by the engine once the widgets are in place.

use super::component::{Component, ComponentRegistry};
use super::node::{dedent, Node};
use super::rules::{compile_rules, RuleMap};
use crate::dsl::{self, DESCRIPTOR_PREFIX};
use crate::renderer::{AttrValue, EventBinding, Widget, WidgetId, WidgetKind, WidgetTree};
use crate::script::is_event_name;
use crate::utils::error::{CompileError, Result};
use std::sync::Arc;

/// Nested component expansions allowed before a component counts as recursive
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// Page children that are not part of the content subtree
const PAGE_DIRECTIVES: [&str; 4] = ["component", "complib", "style", "script"];

/// Result of compiling one content subtree
#[derive(Debug, Clone)]
pub struct Compiled {
    /// Root widget, detached
    pub root: WidgetId,
    /// Style rules of every compiled widget, scoped to their unique selectors
    pub rules: RuleMap,
    /// Every compiled widget, parents first
    pub widgets: Vec<WidgetId>,
}

/// Result of compiling a `<page>` document
#[derive(Debug, Clone, Default)]
pub struct CompiledPage {
    /// Attributes of the `<page>` element
    pub properties: Vec<(String, String)>,
    /// Declared title, if any
    pub title: Option<String>,
    /// Page-wide rules followed by the content rules
    pub rules: RuleMap,
    /// Page-level scripts, run in the document scope
    pub scripts: Vec<String>,
    /// The single content subtree
    pub content: Option<Compiled>,
}

/// Compile a content subtree into detached widgets
pub fn compile(node: &Node, registry: &ComponentRegistry, tree: &mut WidgetTree) -> Result<Compiled> {
    let mut compiler = MarkupCompiler {
        registry,
        tree,
        rules: RuleMap::new(),
        widgets: Vec::new(),
    };

    match compiler.compile_node(node, 0) {
        Ok(root) => Ok(Compiled {
            root,
            rules: compiler.rules,
            widgets: compiler.widgets,
        }),
        Err(err) => {
            for id in compiler.widgets {
                compiler.tree.remove(id);
            }
            Err(err)
        }
    }
}

/// Compile a full document: `<celx><page>…</page></celx>` or a bare `<page>`.
///
/// Components and libraries are registered before the content is compiled,
/// so they may be declared after it.
pub fn compile_page(
    document: &Node,
    registry: &mut ComponentRegistry,
    tree: &mut WidgetTree,
) -> Result<CompiledPage> {
    let page = if document.tag == "page" {
        document
    } else {
        document.child("page").ok_or(CompileError::MissingPage)?
    };

    let content_nodes: Vec<&Node> = page
        .children
        .iter()
        .filter(|child| !PAGE_DIRECTIVES.contains(&child.tag.as_str()))
        .collect();
    if content_nodes.len() > 1 {
        return Err(CompileError::MultipleContentNodes(content_nodes.len()).into());
    }

    let mut compiled = CompiledPage {
        properties: page.attributes.clone(),
        title: page.attr("title").map(str::to_string),
        ..Default::default()
    };

    for child in &page.children {
        match child.tag.as_str() {
            "complib" => {
                registry.register_library(child)?;
            }
            "component" => registry.register(Component::from_node(child, None)?),
            "style" => compiled
                .rules
                .merge(compile_rules(child.text.as_deref().unwrap_or_default(), None)?),
            "script" => compiled
                .scripts
                .push(dedent(child.text.as_deref().unwrap_or_default())),
            _ => {}
        }
    }

    if let Some(node) = content_nodes.first() {
        let content = compile(node, registry, tree)?;
        compiled.rules.merge(content.rules.clone());
        compiled.content = Some(content);
    }

    log::debug!(
        "compiled page {:?}: {} rules, {} page scripts",
        compiled.title,
        compiled.rules.len(),
        compiled.scripts.len()
    );
    Ok(compiled)
}

/// Compile a response fragment. A full `celx` document yields its content
/// subtree, with the page rules merged in front of the content rules.
pub fn compile_fragment(
    node: &Node,
    registry: &mut ComponentRegistry,
    tree: &mut WidgetTree,
) -> Result<Compiled> {
    if node.tag != "celx" && node.tag != "page" {
        return compile(node, registry, tree);
    }

    let page = compile_page(node, registry, tree)?;
    if !page.scripts.is_empty() {
        log::warn!("ignoring {} page scripts in fragment", page.scripts.len());
    }

    let mut content = page.content.ok_or(CompileError::MissingPage)?;
    content.rules = page.rules;
    Ok(content)
}

struct MarkupCompiler<'a> {
    registry: &'a ComponentRegistry,
    tree: &'a mut WidgetTree,
    rules: RuleMap,
    widgets: Vec<WidgetId>,
}

impl MarkupCompiler<'_> {
    fn compile_node(&mut self, node: &Node, expansions: usize) -> Result<WidgetId> {
        if let Some(component) = self.registry.get(&node.tag) {
            if expansions >= MAX_EXPANSION_DEPTH {
                return Err(CompileError::MalformedComponent {
                    name: component.name().to_string(),
                    reason: format!("expansion nested deeper than {} levels", MAX_EXPANSION_DEPTH),
                }
                .into());
            }
            let expanded = component.expand(node);
            return self.compile_node(&expanded, expansions + 1);
        }

        let kind = WidgetKind::from_tag(&node.tag)
            .ok_or_else(|| CompileError::UnknownTag(node.tag.clone()))?;
        let id = self.tree.construct(Widget::new(kind));
        self.widgets.push(id);

        let mut handlers = String::new();
        {
            let widget = self.tree.widget_mut(id)?;
            for (key, value) in &node.attributes {
                let key = key.replace('-', "_");
                match key.as_str() {
                    "groups" => {
                        widget.set_groups(value.split_whitespace().map(str::to_string).collect())
                    }
                    "eid" => widget.set_eid(Some(value.clone())),
                    _ if is_event_name(&key) => match value.strip_prefix(DESCRIPTOR_PREFIX) {
                        Some(descriptor) => {
                            let actions = dsl::compile(descriptor)?;
                            widget.bind(key, EventBinding::Actions(Arc::new(actions)));
                        }
                        None => {
                            handlers.push_str(&format!("function {}() {} end\n", key, value));
                        }
                    },
                    _ => widget.set_attribute(key, Some(AttrValue::coerce(value))),
                }
            }

            if let Some(text) = node.extract_text() {
                let text = dedent(&text);
                let text = text.trim_matches('\n');
                if !text.trim().is_empty() {
                    widget.set_content(Some(text.to_string()));
                }
            }
        }

        let query = self.tree.query(id);
        let mut script = String::new();

        for child in &node.children {
            match child.tag.as_str() {
                "style" | "styles" => {
                    let rules = compile_rules(child.text.as_deref().unwrap_or_default(), Some(&query))?;
                    self.rules.merge(rules);
                }
                "script" | "lua" => {
                    script.push_str(&dedent(child.text.as_deref().unwrap_or_default()));
                    script.push('\n');
                }
                _ => {
                    if !kind.is_container() {
                        return Err(CompileError::LeafWithChildren(query).into());
                    }
                    let child_id = self.compile_node(child, expansions)?;
                    self.tree.append(id, child_id)?;
                }
            }
        }

        script.push_str(&handlers);
        if !script.trim().is_empty() {
            self.tree.widget_mut(id)?.set_script(Some(script));
        }

        log::debug!("compiled {}", query);
        Ok(id)
    }
}
