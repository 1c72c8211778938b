//! Live interface tree
//!
//! Widgets, selectors, style rules and content providers.

pub mod content;
pub mod selector;
pub mod style;
pub mod tree;
pub mod widget;

pub use content::{ContentProvider, InterpolatedContent};
pub use selector::{Compound, Selector};
pub use style::{ComputedStyle, RuleBook, DOCUMENT_PRIORITY, SCRIPT_PRIORITY};
pub use tree::{Edit, WidgetTree};
pub use widget::{AttrValue, EventBinding, Widget, WidgetId, WidgetKind};
