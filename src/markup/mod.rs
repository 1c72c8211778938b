//! Markup documents
//!
//! Reading markup text into transient [`Node`] trees, compiling style-rule
//! blocks, and compiling nodes into widgets with component expansion.

pub mod compiler;
pub mod component;
pub mod node;
pub mod parser;
pub mod rules;

pub use compiler::{compile, compile_fragment, compile_page, Compiled, CompiledPage};
pub use component::{Component, ComponentRegistry};
pub use node::Node;
pub use parser::MarkupParser;
pub use rules::{compile_rules, PropertyMap, RuleMap, StyleValue};
