//! Conversions between Lua values and widget data

use super::runtime::{host_op, runtime_error, APPEND, GET_FIELD, SET_FIELD};
use super::scope::{ScopeHandle, ScopeRef};
use crate::markup::StyleValue;
use crate::renderer::{AttrValue, WidgetId, WidgetKind, WidgetTree};
use crate::utils::error::ScriptError;
use mlua::{AnyUserData, IntoLua, Lua, MetaMethod, UserData, UserDataMethods, Value};

/// Script handle to a live widget; fields read and write through the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetRef(pub WidgetId);

impl UserData for WidgetRef {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, field: String| {
            if field == "append" {
                return append(lua).map(Value::Function);
            }
            host_op(lua, GET_FIELD)?.call::<Value>((this.0.index(), field))
        });
        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (field, value): (String, Value)| {
                host_op(lua, SET_FIELD)?.call::<()>((this.0.index(), field, value))
            },
        );
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: AnyUserData| {
            Ok(other.borrow::<WidgetRef>().is_ok_and(|other| *other == *this))
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("widget: {}", this.0))
        });
    }
}

/// `parent:append(child)`
fn append(lua: &Lua) -> mlua::Result<mlua::Function> {
    lua.create_function(|lua, (parent, child): (Value, Value)| {
        let (Some(parent), Some(child)) = (widget_of(&parent), widget_of(&child)) else {
            return Err(runtime_error("append expects two widgets"));
        };
        host_op(lua, APPEND)?.call::<()>((parent.index(), child.index()))
    })
}

/// Widget behind a value, if it is a widget handle
pub fn widget_of(value: &Value) -> Option<WidgetId> {
    match value {
        Value::UserData(data) => data.borrow::<WidgetRef>().ok().map(|widget| widget.0),
        _ => None,
    }
}

fn scope_of(value: &Value) -> Option<ScopeRef> {
    match value {
        Value::UserData(data) => data.borrow::<ScopeHandle>().ok()?.scope().ok(),
        _ => None,
    }
}

pub fn is_callable(value: &Value) -> bool {
    matches!(value, Value::Function(_))
}

pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Nil | Value::Boolean(false))
}

/// `tostring`-style rendering
pub fn display(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(x) => format_float(*x),
        Value::String(s) => String::from(s.to_string_lossy()),
        Value::UserData(_) => match (widget_of(value), scope_of(value)) {
            (Some(widget), _) => format!("widget: {}", widget),
            (None, Some(scope)) => format!("scope: {}", scope.id()),
            (None, None) => format!("userdata: {:p}", value.to_pointer()),
        },
        other => format!("{}: {:p}", other.type_name(), other.to_pointer()),
    }
}

fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x.fract() == 0.0 && x.abs() < 1e16 {
        return format!("{:.1}", x);
    }
    x.to_string()
}

/// Convert into an attribute value; `None` for values attributes cannot hold
pub fn to_attr(value: &Value) -> Option<AttrValue> {
    match value {
        Value::Integer(i) => Some(AttrValue::Int(*i)),
        Value::Number(x) => Some(AttrValue::Float(*x)),
        Value::Boolean(b) => Some(AttrValue::Bool(*b)),
        Value::String(s) => Some(AttrValue::Str(String::from(s.to_string_lossy()))),
        _ => None,
    }
}

pub fn attr_to_lua(lua: &Lua, attr: &AttrValue) -> mlua::Result<Value> {
    match attr {
        AttrValue::Int(i) => Ok(Value::Integer(*i)),
        AttrValue::Float(x) => Ok(Value::Number(*x)),
        AttrValue::Bool(b) => Ok(Value::Boolean(*b)),
        AttrValue::Str(s) => lua.create_string(s).map(Value::String),
    }
}

/// Convert into a style property value
pub fn to_style(value: &Value) -> StyleValue {
    match value {
        Value::Nil => StyleValue::Null,
        Value::Boolean(b) => StyleValue::Bool(*b),
        Value::Integer(i) => StyleValue::Int(*i),
        Value::Number(x) => StyleValue::Float(*x),
        Value::Table(table) => StyleValue::List(
            table
                .clone()
                .sequence_values::<Value>()
                .filter_map(|item| item.ok())
                .map(|item| to_style(&item))
                .collect(),
        ),
        other => StyleValue::Str(display(other)),
    }
}

/// Words of a `groups` value: a sequence table or a space separated string
pub fn to_words(value: &Value) -> Result<Vec<String>, ScriptError> {
    match value {
        Value::Table(table) => Ok(table
            .clone()
            .sequence_values::<Value>()
            .filter_map(|item| item.ok())
            .map(|item| display(&item))
            .collect()),
        Value::String(text) => Ok(text
            .to_string_lossy()
            .split_whitespace()
            .map(str::to_string)
            .collect()),
        Value::Nil => Ok(Vec::new()),
        other => Err(ScriptError::new(format!(
            "groups must be a table or string, got {}",
            other.type_name()
        ))),
    }
}

/// A widget field as read from the tree
#[derive(Debug, Clone)]
pub enum Field {
    Nil,
    Attr(AttrValue),
    Widget(WidgetId),
    Widgets(Vec<WidgetId>),
    Words(Vec<String>),
    Scope(ScopeRef),
}

impl Field {
    /// Text shown for the field in interpolated content; `None` when unset
    pub fn display(&self) -> Option<String> {
        match self {
            Self::Nil => None,
            Self::Attr(attr) => Some(attr.to_string()),
            Self::Widget(id) => Some(format!("widget: {}", id)),
            Self::Widgets(ids) => Some(
                ids.iter()
                    .map(|id| format!("widget: {}", id))
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Self::Words(words) => Some(words.join(" ")),
            Self::Scope(scope) => Some(format!("scope: {}", scope.id())),
        }
    }
}

impl IntoLua for Field {
    fn into_lua(self, lua: &Lua) -> mlua::Result<Value> {
        match self {
            Self::Nil => Ok(Value::Nil),
            Self::Attr(attr) => attr_to_lua(lua, &attr),
            Self::Widget(id) => WidgetRef(id).into_lua(lua),
            Self::Widgets(ids) => lua
                .create_sequence_from(ids.into_iter().map(WidgetRef))
                .map(Value::Table),
            Self::Words(words) => lua.create_sequence_from(words).map(Value::Table),
            Self::Scope(scope) => ScopeHandle::new(&scope).into_lua(lua),
        }
    }
}

/// Read a field of a widget.
///
/// Names starting with `_` are never exposed.
pub fn widget_field(tree: &WidgetTree, id: WidgetId, field: &str) -> Result<Field, ScriptError> {
    if field.starts_with('_') {
        return Err(ScriptError::new(format!(
            "access to attribute '{}' is denied",
            field
        )));
    }

    let widget = tree
        .get(id)
        .ok_or_else(|| ScriptError::new(format!("widget {} no longer exists", id)))?;
    let text = |value: Option<&str>| match value {
        Some(value) => Field::Attr(AttrValue::Str(value.to_string())),
        None => Field::Nil,
    };

    let value = match field {
        "content" => text(widget.content()),
        "eid" => text(widget.eid()),
        "kind" => text(Some(widget.kind().name())),
        "selector" => Field::Attr(AttrValue::Str(tree.query(id))),
        "groups" => Field::Words(widget.groups().to_vec()),
        "parent" => widget.parent().map(Field::Widget).unwrap_or(Field::Nil),
        "children" => Field::Widgets(widget.children().to_vec()),
        "checked" if widget.kind() == WidgetKind::Checkbox => {
            Field::Attr(AttrValue::Bool(widget.is_checked()))
        }
        "scope" => widget.scope().cloned().map(Field::Scope).unwrap_or(Field::Nil),
        name => widget
            .attribute(name)
            .cloned()
            .map(Field::Attr)
            .unwrap_or(Field::Nil),
    };

    Ok(value)
}

enum Step {
    Value(Value),
    Scope(ScopeRef),
    Field(Field),
}

fn lookup(scope: &ScopeRef, name: &str) -> Step {
    if name == "outer" {
        return match scope.parent() {
            Some(parent) => Step::Scope(parent.clone()),
            None => Step::Value(Value::Nil),
        };
    }
    Step::Value(scope.get(name).unwrap_or(Value::Nil))
}

/// Resolve a dotted path (`count`, `outer.count`, `self.content`) from a
/// scope into display text; `None` when any segment is missing
pub fn resolve_path(scope: &ScopeRef, tree: &WidgetTree, path: &str) -> Option<String> {
    let mut segments = path.split('.');
    let mut current = lookup(scope, segments.next()?);

    for segment in segments {
        current = match current {
            Step::Scope(inner) | Step::Field(Field::Scope(inner)) => lookup(&inner, segment),
            Step::Field(Field::Widget(id)) => Step::Field(widget_field(tree, id, segment).ok()?),
            Step::Value(Value::Table(table)) => Step::Value(table.get::<Value>(segment).ok()?),
            Step::Value(value @ Value::UserData(_)) => match (widget_of(&value), scope_of(&value)) {
                (Some(id), _) => Step::Field(widget_field(tree, id, segment).ok()?),
                (None, Some(inner)) => lookup(&inner, segment),
                (None, None) => return None,
            },
            _ => return None,
        };
    }

    match current {
        Step::Value(Value::Nil) => None,
        Step::Value(value) => Some(display(&value)),
        Step::Scope(scope) => Some(format!("scope: {}", scope.id())),
        Step::Field(field) => field.display(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Widget;
    use crate::script::{Builtins, ScopeEnv};
    use std::rc::Rc;

    #[test]
    fn test_truthiness() {
        let lua = Lua::new();
        assert!(!is_truthy(&Value::Nil));
        assert!(!is_truthy(&Value::Boolean(false)));
        assert!(is_truthy(&Value::Integer(0)));
        assert!(is_truthy(&Value::String(lua.create_string("").unwrap())));
    }

    #[test]
    fn test_display() {
        assert_eq!(display(&Value::Number(5.0)), "5.0");
        assert_eq!(display(&Value::Number(0.25)), "0.25");
        assert_eq!(display(&Value::Integer(-3)), "-3");
        assert_eq!(display(&Value::Nil), "nil");
    }

    #[test]
    fn test_style_from_sequence() {
        let lua = Lua::new();
        let table: Value = lua.load("return { 1, 'bold', true }").eval().unwrap();
        assert_eq!(
            to_style(&table),
            StyleValue::List(vec![
                StyleValue::Int(1),
                StyleValue::Str("bold".into()),
                StyleValue::Bool(true)
            ])
        );
    }

    #[test]
    fn test_words() {
        let lua = Lua::new();
        let text = Value::String(lua.create_string("a  b").unwrap());
        assert_eq!(to_words(&text).unwrap(), vec!["a", "b"]);
        assert!(to_words(&Value::Boolean(true)).is_err());
    }

    #[test]
    fn test_private_fields_denied() {
        let mut tree = WidgetTree::new();
        let id = tree.construct(Widget::new(WidgetKind::Text));
        assert!(widget_field(&tree, id, "_scope").is_err());
    }

    #[test]
    fn test_resolve_path_through_widgets() {
        let lua = Lua::new();
        let mut tree = WidgetTree::new();
        let id = tree.construct(Widget::new(WidgetKind::Field).with_content("ada"));

        let scope = ScopeEnv::root(Rc::new(Builtins::new()));
        scope.define("form", WidgetRef(id).into_lua(&lua).unwrap());
        assert_eq!(resolve_path(&scope, &tree, "form.content").as_deref(), Some("ada"));
        assert_eq!(resolve_path(&scope, &tree, "form.kind").as_deref(), Some("Field"));
        assert_eq!(resolve_path(&scope, &tree, "form.missing"), None);
        assert_eq!(resolve_path(&scope, &tree, "outer.x"), None);
    }
}
