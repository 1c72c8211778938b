//! Compiled action instructions

use std::fmt;

/// Instruction verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Swap,
    Insert,
    Append,
    Select,
}

impl Verb {
    /// Parse a verb token, ignoring case
    pub fn parse(token: &str) -> Option<Self> {
        let verb = match token.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "SWAP" => Self::Swap,
            "INSERT" => Self::Insert,
            "APPEND" => Self::Append,
            "SELECT" => Self::Select,
            _ => return None,
        };
        Some(verb)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Swap => "SWAP",
            Self::Insert => "INSERT",
            Self::Append => "APPEND",
            Self::Select => "SELECT",
        }
    }

    /// Verbs that issue a remote call
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Get | Self::Post | Self::Put | Self::Patch | Self::Delete
        )
    }

    /// Verbs that edit the live tree
    pub fn is_tree_edit(&self) -> bool {
        matches!(self, Self::Swap | Self::Insert | Self::Append)
    }

    /// Modifiers this verb accepts; `None` means any value (a selector)
    pub fn legal_modifiers(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Swap | Self::Insert => Some(&["in", "before", "after"]),
            Self::Append => Some(&["in"]),
            Self::Select => Some(&[]),
            _ => None,
        }
    }

    /// Whether the verb must be given a modifier
    pub fn requires_modifier(&self) -> bool {
        matches!(self, Self::Insert)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a tree edit places the result relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Replace the target itself
    Replace,
    In,
    Before,
    After,
}

impl Placement {
    pub fn from_modifier(modifier: Option<&str>) -> Option<Self> {
        match modifier {
            None => Some(Self::Replace),
            Some("in") => Some(Self::In),
            Some("before") => Some(Self::Before),
            Some("after") => Some(Self::After),
            Some(_) => None,
        }
    }
}

/// One step of an action list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub verb: Verb,
    /// Endpoint for remote calls, selector otherwise
    pub arg: String,
    /// Body-source selector for remote calls, placement for tree edits
    pub modifier: Option<String>,
}

impl Instruction {
    pub fn new(verb: Verb, arg: impl Into<String>, modifier: Option<&str>) -> Self {
        Self {
            verb,
            arg: arg.into(),
            modifier: modifier.map(str::to_string),
        }
    }

    /// Placement of a tree edit
    pub fn placement(&self) -> Option<Placement> {
        Placement::from_modifier(self.modifier.as_deref())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.modifier {
            Some(modifier) => write!(f, "{} {} {}", self.verb, modifier, self.arg),
            None => write!(f, "{} {}", self.verb, self.arg),
        }
    }
}
