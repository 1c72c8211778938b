//! Widget selectors
//!
//! `Kind#eid.group/state@N`, compound parts separated by whitespace for
//! descendant matching. `*` matches any kind.

use super::tree::WidgetTree;
use super::widget::WidgetId;
use crate::utils::error::SelectionError;

/// One compound selector
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    pub kind: Option<String>,
    pub eid: Option<String>,
    pub groups: Vec<String>,
    pub state: Option<String>,
    pub identity: Option<usize>,
}

impl Compound {
    /// Calculate specificity (a, b, c)
    pub fn specificity(&self) -> (u32, u32, u32) {
        let a = u32::from(self.eid.is_some() || self.identity.is_some());
        let b = self.groups.len() as u32 + u32::from(self.state.is_some());
        let c = u32::from(self.kind.is_some());
        (a, b, c)
    }

    /// Check if this compound matches a widget, ignoring `state`
    pub fn matches(&self, tree: &WidgetTree, id: WidgetId) -> bool {
        let Some(widget) = tree.get(id) else {
            return false;
        };

        if let Some(kind) = &self.kind {
            if !kind.eq_ignore_ascii_case(widget.kind().name()) {
                return false;
            }
        }

        if let Some(eid) = &self.eid {
            if widget.eid() != Some(eid.as_str()) {
                return false;
            }
        }

        if let Some(identity) = self.identity {
            if id.index() != identity {
                return false;
            }
        }

        self.groups
            .iter()
            .all(|group| widget.groups().iter().any(|own| own == group))
    }
}

/// Parsed selector: compounds from outermost ancestor to subject
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    parts: Vec<Compound>,
}

impl Selector {
    /// Parse selector text
    pub fn parse(text: &str) -> Result<Self, SelectionError> {
        let parts = text
            .split_whitespace()
            .map(|part| Self::parse_compound(part).ok_or_else(|| SelectionError::InvalidSelector(text.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        if parts.is_empty() {
            return Err(SelectionError::InvalidSelector(text.to_string()));
        }

        Ok(Self {
            source: text.trim().to_string(),
            parts,
        })
    }

    fn parse_compound(text: &str) -> Option<Compound> {
        let mut compound = Compound::default();
        let mut current = String::new();
        // K=kind, I=eid, G=group, S=state, N=identity
        let mut mode = 'K';

        let flush = |mode: char, current: &mut String, compound: &mut Compound| -> Option<()> {
            if current.is_empty() {
                return if mode == 'K' { Some(()) } else { None };
            }
            let value = std::mem::take(current);
            match mode {
                'K' if value == "*" => {}
                'K' => compound.kind = Some(value),
                'I' => compound.eid = Some(value),
                'G' => compound.groups.push(value),
                'S' => compound.state = Some(value),
                'N' => compound.identity = Some(value.parse().ok()?),
                _ => return None,
            }
            Some(())
        };

        for c in text.chars() {
            match c {
                '#' | '.' | '/' | '@' => {
                    flush(mode, &mut current, &mut compound)?;
                    mode = match c {
                        '#' => 'I',
                        '.' => 'G',
                        '/' => 'S',
                        _ => 'N',
                    };
                }
                _ => current.push(c),
            }
        }
        flush(mode, &mut current, &mut compound)?;

        Some(compound)
    }

    /// Original selector text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compound the matched widget itself must satisfy
    pub fn subject(&self) -> &Compound {
        // parse guarantees at least one part
        &self.parts[self.parts.len() - 1]
    }

    /// Summed specificity of every compound
    pub fn specificity(&self) -> (u32, u32, u32) {
        self.parts.iter().fold((0, 0, 0), |acc, part| {
            let (a, b, c) = part.specificity();
            (acc.0 + a, acc.1 + b, acc.2 + c)
        })
    }

    /// Whether any compound requires an interaction state
    pub fn has_state(&self) -> bool {
        self.parts.iter().any(|part| part.state.is_some())
    }

    /// Check if this selector matches a widget in the tree
    pub fn matches(&self, tree: &WidgetTree, id: WidgetId) -> bool {
        let (subject, ancestors) = match self.parts.split_last() {
            Some(split) => split,
            None => return false,
        };

        if !subject.matches(tree, id) {
            return false;
        }

        let mut remaining = ancestors.iter().rev().peekable();
        let mut current = tree.parent(id);
        while let Some(part) = remaining.peek() {
            let Some(candidate) = current else {
                return false;
            };
            if part.matches(tree, candidate) {
                remaining.next();
            }
            current = tree.parent(candidate);
        }

        true
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}
