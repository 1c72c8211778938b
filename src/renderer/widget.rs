//! Widgets of the live interface tree

use super::content::ContentProvider;
use crate::dsl::Instruction;
use crate::script::ScopeRef;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Handle to a widget in a [`WidgetTree`](super::WidgetTree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub(crate) usize);

impl WidgetId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Widget kinds, one per markup tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Text,
    Button,
    Link,
    Field,
    Checkbox,
    Slider,
    Tower,
    Row,
    Container,
    Dialogue,
}

impl WidgetKind {
    pub const ALL: [Self; 10] = [
        Self::Text,
        Self::Button,
        Self::Link,
        Self::Field,
        Self::Checkbox,
        Self::Slider,
        Self::Tower,
        Self::Row,
        Self::Container,
        Self::Dialogue,
    ];

    /// Kind for a markup tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag.to_ascii_lowercase().as_str() {
            "text" => Self::Text,
            "button" => Self::Button,
            "link" => Self::Link,
            "field" => Self::Field,
            "checkbox" => Self::Checkbox,
            "slider" => Self::Slider,
            "tower" => Self::Tower,
            "row" => Self::Row,
            "container" => Self::Container,
            "dialogue" => Self::Dialogue,
            _ => return None,
        };
        Some(kind)
    }

    /// Name used in selectors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Button => "Button",
            Self::Link => "Link",
            Self::Field => "Field",
            Self::Checkbox => "Checkbox",
            Self::Slider => "Slider",
            Self::Tower => "Tower",
            Self::Row => "Row",
            Self::Container => "Container",
            Self::Dialogue => "Dialogue",
        }
    }

    /// Whether widgets of this kind hold children
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Tower | Self::Row | Self::Container | Self::Dialogue
        )
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl AttrValue {
    /// Coerce markup attribute text: numeric-looking values become numbers
    pub fn coerce(raw: &str) -> Self {
        let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);

        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(int) = raw.parse::<i64>() {
                return Self::Int(int);
            }
        }

        let mut parts = digits.splitn(2, '.');
        let whole = parts.next().unwrap_or_default();
        if let Some(fraction) = parts.next() {
            let numeric = |part: &str| part.chars().all(|c| c.is_ascii_digit());
            if !(whole.is_empty() && fraction.is_empty())
                && numeric(whole)
                && numeric(fraction)
                && !fraction.is_empty()
            {
                if let Ok(float) = raw.parse::<f64>() {
                    return Self::Float(float);
                }
            }
        }

        Self::Str(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(x) => *x != 0.0,
            Self::Str(s) => !s.is_empty() && s != "false",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(x) => serde_json::Value::from(*x),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// What runs when an event fires
#[derive(Clone)]
pub enum EventBinding {
    /// Compiled action descriptor
    Actions(Arc<Vec<Instruction>>),
    /// Script function, called with the widget as its argument
    Script(mlua::Function),
}

impl fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actions(actions) => f.debug_tuple("Actions").field(actions).finish(),
            Self::Script(_) => f.write_str("Script"),
        }
    }
}

/// A node of the live interface tree
pub struct Widget {
    kind: WidgetKind,
    eid: Option<String>,
    groups: Vec<String>,
    attributes: BTreeMap<String, AttrValue>,
    content: Option<String>,
    pub(crate) parent: Option<WidgetId>,
    pub(crate) children: Vec<WidgetId>,
    bindings: Vec<(String, EventBinding)>,
    scope: Option<ScopeRef>,
    script: Option<String>,
    content_provider: Option<Box<dyn ContentProvider>>,
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("kind", &self.kind)
            .field("eid", &self.eid)
            .field("groups", &self.groups)
            .field("attributes", &self.attributes)
            .field("content", &self.content)
            .field("children", &self.children)
            .finish()
    }
}

impl Widget {
    /// Create a new widget of the given kind
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            kind,
            eid: None,
            groups: Vec::new(),
            attributes: BTreeMap::new(),
            content: None,
            parent: None,
            children: Vec::new(),
            bindings: Vec::new(),
            scope: None,
            script: None,
            content_provider: None,
        }
    }

    /// Builder: set the element id
    pub fn with_eid(mut self, eid: impl Into<String>) -> Self {
        self.eid = Some(eid.into());
        self
    }

    /// Builder: set the content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Builder: add a group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Builder: set an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    pub fn eid(&self) -> Option<&str> {
        self.eid.as_deref()
    }

    pub fn set_eid(&mut self, eid: Option<String>) {
        self.eid = eid;
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn set_groups(&mut self, groups: Vec<String>) {
        self.groups = groups;
    }

    /// Raw content text, before interpolation
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn set_content(&mut self, content: Option<String>) {
        self.content = content;
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attributes
    }

    /// Set an attribute; `None` removes it
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Option<AttrValue>) {
        let name = name.into();
        match value {
            Some(value) => {
                self.attributes.insert(name, value);
            }
            None => {
                self.attributes.remove(&name);
            }
        }
    }

    /// Checkbox state
    pub fn is_checked(&self) -> bool {
        self.attributes
            .get("checked")
            .is_some_and(AttrValue::is_truthy)
    }

    pub fn parent(&self) -> Option<WidgetId> {
        self.parent
    }

    pub fn children(&self) -> &[WidgetId] {
        &self.children
    }

    /// Bind an event; a later binding for the same event replaces it
    pub fn bind(&mut self, event: impl Into<String>, binding: EventBinding) {
        let event = event.into();
        match self.bindings.iter_mut().find(|(name, _)| *name == event) {
            Some(slot) => slot.1 = binding,
            None => self.bindings.push((event, binding)),
        }
    }

    pub fn binding(&self, event: &str) -> Option<&EventBinding> {
        self.bindings
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, binding)| binding)
    }

    pub fn bindings(&self) -> &[(String, EventBinding)] {
        &self.bindings
    }

    pub fn scope(&self) -> Option<&ScopeRef> {
        self.scope.as_ref()
    }

    pub fn set_scope(&mut self, scope: ScopeRef) {
        self.scope = Some(scope);
    }

    /// Script source collected at compile time
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn set_script(&mut self, script: Option<String>) {
        self.script = script;
    }

    pub fn content_provider(&self) -> Option<&dyn ContentProvider> {
        self.content_provider.as_deref()
    }

    pub fn set_content_provider(&mut self, provider: Box<dyn ContentProvider>) {
        self.content_provider = Some(provider);
    }
}
