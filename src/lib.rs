//! # celx - terminal hypermedia client
//!
//! Pages are markup documents fetched from a server and compiled into a
//! tree of terminal widgets. Behavior comes from two languages: a small
//! action DSL that issues remote calls and splices the returned fragments
//! into the tree, and embedded Lua scripts with reactive,
//! widget-scoped variables.
//!
//! ## Architecture
//!
//! - **markup**: document parser, components and slots, the markup compiler
//!   and style rule blocks
//! - **dsl**: action descriptor compiler and instruction interpreter
//! - **script**: the Lua runtime, scopes, builtins and widget bindings
//! - **renderer**: widget arena, selectors, content interpolation and rule
//!   resolution
//! - **network**: blocking HTTP client behind a transport trait
//! - **engine**: the browsing session, navigation and worker threads
//! - **utils**: configuration and error types

pub mod dsl;
pub mod engine;
pub mod markup;
pub mod network;
pub mod renderer;
pub mod script;
pub mod utils;

// Re-export main types for convenience
pub use engine::Browser;
pub use utils::error::{CelxError, Result};
pub use utils::BrowserConfig;

/// Client version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "celx";
