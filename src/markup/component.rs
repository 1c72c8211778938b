//! Reusable components
//!
//! A component is declared as
//!
//! ```text
//! <component name="counter" start="0">
//!     <tower>
//!         <text>$start</text>
//!         <_slot/>
//!     </tower>
//! </component>
//! ```
//!
//! Every attribute except `name` is a parameter with its default value. The
//! first child is the template. Expanding a call site clones the template,
//! substitutes `$param` occurrences, moves the call-site children into the
//! `_slot` marker and forwards the remaining call-site attributes onto the
//! expanded root.

use super::node::Node;
use crate::utils::error::CompileError;
use std::collections::HashMap;

/// Tag marking where call-site children are injected
pub const SLOT_TAG: &str = "_slot";

/// A registered component
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    name: String,
    params: Vec<(String, String)>,
    template: Node,
}

impl Component {
    /// Build a component from its `<component>` declaration
    pub fn from_node(node: &Node, namespace: Option<&str>) -> Result<Self, CompileError> {
        let mut name = None;
        let mut params = Vec::new();

        for (key, value) in &node.attributes {
            if key == "name" {
                name = Some(value.clone());
            } else {
                params.push((key.clone(), value.clone()));
            }
        }

        let name = name.ok_or(CompileError::MissingComponentName)?;
        let name = match namespace {
            Some(namespace) => format!("{}.{}", namespace, name),
            None => name,
        };

        let mut template = node
            .children
            .first()
            .cloned()
            .ok_or_else(|| CompileError::MalformedComponent {
                name: name.clone(),
                reason: "no template element".into(),
            })?;
        template.tail = None;

        Ok(Self {
            name,
            params,
            template,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters with their declared defaults, in declaration order
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn template(&self) -> &Node {
        &self.template
    }

    /// Expand a call site into a fresh node tree.
    ///
    /// Parameters are substituted before the slot is filled, so call-site
    /// children are never rewritten.
    pub fn expand(&self, call_site: &Node) -> Node {
        let values: HashMap<&str, &str> = self
            .params
            .iter()
            .map(|(key, default)| {
                let value = call_site.attr(key).unwrap_or(default);
                (key.as_str(), value)
            })
            .collect();

        let mut names: Vec<&str> = values.keys().copied().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        let mut expanded = self.template.clone();
        expanded.walk_mut(&mut |node: &mut Node| {
            for (_, value) in node.attributes.iter_mut() {
                *value = substitute(value, &names, &values);
            }
            if let Some(text) = node.text.as_mut() {
                *text = substitute(text, &names, &values);
            }
            if let Some(tail) = node.tail.as_mut() {
                *tail = substitute(tail, &names, &values);
            }
        });

        fill_slot(&mut expanded, &call_site.children);

        for (key, value) in &call_site.attributes {
            if !values.contains_key(key.as_str()) {
                expanded.set_attr(key.clone(), value.clone());
            }
        }

        expanded.tail = call_site.tail.clone();
        expanded
    }
}

/// Replace `$param` occurrences in one left-to-right pass, trying longer
/// names first so `$count` never matches a `$c` parameter.
fn substitute(text: &str, names: &[&str], values: &HashMap<&str, &str>) -> String {
    if !text.contains('$') || names.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        match names.iter().find(|name| after.starts_with(**name)) {
            Some(name) => {
                out.push_str(values.get(name).copied().unwrap_or_default());
                rest = &after[name.len()..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Swap the first `_slot` marker for `children`; returns whether one was found
fn fill_slot(node: &mut Node, children: &[Node]) -> bool {
    let Some(idx) = node.children.iter().position(|child| child.tag == SLOT_TAG) else {
        return node
            .children
            .iter_mut()
            .any(|child| fill_slot(child, children));
    };

    let marker = node.children.remove(idx);
    let mut injected: Vec<Node> = children.to_vec();

    if let Some(tail) = marker.tail {
        match injected.last_mut() {
            Some(last) => last.tail.get_or_insert_with(String::new).push_str(&tail),
            None => {
                let slot = match idx.checked_sub(1) {
                    Some(prev) => &mut node.children[prev].tail,
                    None => &mut node.text,
                };
                slot.get_or_insert_with(String::new).push_str(&tail);
            }
        }
    }

    node.children.splice(idx..idx, injected);
    true
}

/// Components known to the current session, by (possibly namespaced) name
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Component>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component, replacing any previous one with the same name
    pub fn register(&mut self, component: Component) {
        log::debug!("registered component '{}'", component.name());
        self.components.insert(component.name.clone(), component);
    }

    /// Register every child of a `<complib>` element
    pub fn register_library(&mut self, library: &Node) -> Result<usize, CompileError> {
        let namespace = library.attr("namespace");
        for child in &library.children {
            self.register(Component::from_node(child, namespace)?);
        }
        Ok(library.children.len())
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::MarkupParser;
    use pretty_assertions::assert_eq;

    fn component(markup: &str) -> Component {
        Component::from_node(&MarkupParser::parse(markup).unwrap(), None).unwrap()
    }

    #[test]
    fn test_params_use_call_site_or_default() {
        let counter = component(
            r#"<component name="counter" start="0" label="Count"><text>$label: $start</text></component>"#,
        );
        let call = Node::new("counter").with_attr("start", "5");

        let expanded = counter.expand(&call);
        assert_eq!(expanded.tag, "text");
        assert_eq!(expanded.text.as_deref(), Some("Count: 5"));
    }

    #[test]
    fn test_longest_name_first_single_pass() {
        let item = component(
            r#"<component name="item" c="x" count="$c"><text value="$count">$c/$count</text></component>"#,
        );
        let expanded = item.expand(&Node::new("item").with_attr("count", "7"));

        assert_eq!(expanded.attr("value"), Some("7"));
        // the substituted "$c" default is not rewritten again
        assert_eq!(expanded.text.as_deref(), Some("x/7"));
        let dflt = item.expand(&Node::new("item"));
        assert_eq!(dflt.text.as_deref(), Some("x/$c"));
    }

    #[test]
    fn test_slot_preserves_order_and_tail() {
        let card = component(
            r#"<component name="card"><tower><text>head</text><_slot/>after<text>foot</text></tower></component>"#,
        );
        let call = Node::new("card")
            .with_child(Node::new("button").with_text("one"))
            .with_child(Node::new("button").with_text("two"));

        let expanded = card.expand(&call);
        let tags: Vec<&str> = expanded.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["text", "button", "button", "text"]);
        assert_eq!(expanded.children[1].text.as_deref(), Some("one"));
        assert_eq!(expanded.children[2].text.as_deref(), Some("two"));
        assert_eq!(expanded.children[2].tail.as_deref(), Some("after"));
    }

    #[test]
    fn test_empty_slot_keeps_tail() {
        let card = component(r#"<component name="card"><tower><text>a</text><_slot/>rest</tower></component>"#);
        let expanded = card.expand(&Node::new("card"));
        assert_eq!(expanded.children.len(), 1);
        assert_eq!(expanded.children[0].tail.as_deref(), Some("rest"));
    }

    #[test]
    fn test_forwards_non_param_attributes() {
        let card = component(r#"<component name="card" title="t"><tower groups="card"/></component>"#);
        let call = Node::new("card")
            .with_attr("title", "x")
            .with_attr("eid", "main")
            .with_attr("groups", "wide");

        let expanded = card.expand(&call);
        assert_eq!(expanded.attr("eid"), Some("main"));
        assert_eq!(expanded.attr("groups"), Some("wide"));
        assert_eq!(expanded.attr("title"), None);
    }

    #[test]
    fn test_template_untouched_by_expansion() {
        let counter = component(r#"<component name="counter" n="1"><text>$n</text></component>"#);
        let before = counter.template().clone();
        counter.expand(&Node::new("counter").with_attr("n", "9"));
        assert_eq!(counter.template(), &before);
    }

    #[test]
    fn test_missing_name() {
        let node = MarkupParser::parse("<component><text/></component>").unwrap();
        assert_eq!(
            Component::from_node(&node, None).unwrap_err(),
            CompileError::MissingComponentName
        );
    }

    #[test]
    fn test_library_namespace() {
        let lib = MarkupParser::parse(
            r#"<complib namespace="ui"><component name="card"><tower/></component></complib>"#,
        )
        .unwrap();
        let mut registry = ComponentRegistry::new();
        assert_eq!(registry.register_library(&lib).unwrap(), 1);
        assert!(registry.contains("ui.card"));
        assert!(!registry.contains("card"));
    }
}
