//! Embedded scripting
//!
//! Widget behavior is written in Lua. Each widget owns a [`ScopeEnv`];
//! scripts run with that scope as their environment, so plain globals are
//! scope variables.

pub mod builtins;
pub mod runtime;
pub mod scope;
pub mod value;

pub use runtime::{ScriptHost, ScriptRuntime, WidgetSpec};
pub use scope::{is_event_name, Builtins, Change, ScopeEnv, ScopeHandle, ScopeRef};
pub use value::{
    display, is_callable, is_truthy, resolve_path, widget_field, widget_of, Field, WidgetRef,
};
