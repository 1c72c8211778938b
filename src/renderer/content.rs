//! Content providers
//!
//! A widget's displayed content may be computed at render time. The markup
//! compiler installs an [`InterpolatedContent`] provider so `$name` and
//! `$a.b.c` placeholders resolve through the widget's scope.

use super::tree::WidgetTree;
use super::widget::WidgetId;
use crate::script::{resolve_path, ScopeRef};
use crate::utils::error::{CelxError, CompileError};
use regex::Regex;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)")
            .expect("placeholder pattern is valid")
    })
}

/// Computes a widget's displayed content
pub trait ContentProvider {
    fn render(&self, tree: &WidgetTree, id: WidgetId) -> Result<Option<String>, CelxError>;
}

/// Substitutes `$path` placeholders with values from a scope
pub struct InterpolatedContent {
    scope: ScopeRef,
}

impl InterpolatedContent {
    pub fn new(scope: ScopeRef) -> Self {
        Self { scope }
    }

    /// Whether text contains any placeholder
    pub fn has_placeholders(text: &str) -> bool {
        placeholder().is_match(text)
    }

    /// Substitute every placeholder in `text`
    pub fn interpolate(&self, text: &str, tree: &WidgetTree, id: WidgetId) -> Result<String, CompileError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for captures in placeholder().captures_iter(text) {
            let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
                continue;
            };

            let value = resolve_path(&self.scope, tree, path.as_str()).ok_or_else(|| {
                CompileError::UnresolvedPlaceholder {
                    name: path.as_str().to_string(),
                    widget: tree.query(id),
                }
            })?;

            out.push_str(&text[last..whole.start()]);
            out.push_str(&value);
            last = whole.end();
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

impl ContentProvider for InterpolatedContent {
    fn render(&self, tree: &WidgetTree, id: WidgetId) -> Result<Option<String>, CelxError> {
        let widget = tree.widget(id)?;
        match widget.content() {
            Some(text) => Ok(Some(self.interpolate(text, tree, id)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{Widget, WidgetKind};
    use crate::script::{Builtins, ScopeEnv};
    use mlua::{Lua, Value};
    use std::rc::Rc;

    #[test]
    fn test_interpolates_scope_paths() {
        let lua = Lua::new();
        let root = ScopeEnv::root(Rc::new(Builtins::new()));
        root.define("count", Value::Integer(3));
        let scope = ScopeEnv::child(&root);
        scope.define("name", Value::String(lua.create_string("ada").unwrap()));

        let mut tree = WidgetTree::new();
        let id = tree.construct(Widget::new(WidgetKind::Text).with_content("$name has $outer.count items, $count total"));
        tree.widget_mut(id).unwrap().set_content_provider(Box::new(InterpolatedContent::new(scope)));

        assert_eq!(
            tree.render_content(id).unwrap().as_deref(),
            Some("ada has 3 items, 3 total")
        );
    }

    #[test]
    fn test_unresolved_placeholder_names_widget() {
        let scope = ScopeEnv::root(Rc::new(Builtins::new()));
        let mut tree = WidgetTree::new();
        let id = tree.construct(
            Widget::new(WidgetKind::Text)
                .with_eid("greeting")
                .with_content("hello $missing"),
        );
        let provider = InterpolatedContent::new(scope);

        let err = provider.render(&tree, id).unwrap_err();
        match err {
            CelxError::Compile(CompileError::UnresolvedPlaceholder { name, widget }) => {
                assert_eq!(name, "missing");
                assert_eq!(widget, "Text#greeting");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
