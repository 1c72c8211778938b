//! Action DSL
//!
//! Event attributes whose value starts with `:` hold action descriptors:
//! remote calls (`GET`, `POST`, ...), tree edits (`SWAP`, `INSERT`,
//! `APPEND`) and `SELECT`.

pub mod instruction;
pub mod interpreter;
pub mod parser;

pub use instruction::{Instruction, Placement, Verb};
pub use interpreter::{edit_for, ActionHost, InstructionInterpreter, RunHandle};
pub use parser::{compile, compile_instruction};

/// Marks an event attribute value as an action descriptor
pub const DESCRIPTOR_PREFIX: char = ':';
