//! Style-rule compiler
//!
//! Turns indented rule blocks into selector → property-map pairs:
//!
//! ```text
//! Text:
//!     content_style: bold
//!     .active:
//!         content_style: underline
//! ```
//!
//! When compiled for a widget, the block is wrapped in that widget's unique
//! selector, so bare `key: value` lines style the widget itself.

use super::node::{dedent, indent};
use crate::utils::error::CompileError;
use std::collections::BTreeMap;
use std::fmt;

/// A single style property value
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<StyleValue>),
}

impl StyleValue {
    /// Parse the textual form used in rule blocks
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return Self::List(
                inner
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(Self::parse)
                    .collect(),
            );
        }

        match raw {
            "null" | "~" | "" => return Self::Null,
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }

        if let Some(unquoted) = unquote(raw) {
            return Self::Str(unquoted.to_string());
        }

        if let Ok(int) = raw.parse::<i64>() {
            return Self::Int(int);
        }

        if let Ok(float) = raw.parse::<f64>() {
            return Self::Float(float);
        }

        Self::Str(raw.to_string())
    }
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Properties of one selector
pub type PropertyMap = BTreeMap<String, StyleValue>;

/// Ordered selector → properties pairs; merging replaces whole entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleMap {
    rules: Vec<(String, PropertyMap)>,
}

impl RuleMap {
    /// Create an empty rule map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the properties of a selector
    pub fn insert(&mut self, selector: impl Into<String>, properties: PropertyMap) {
        let selector = selector.into();
        match self.rules.iter_mut().find(|(key, _)| *key == selector) {
            Some(entry) => entry.1 = properties,
            None => self.rules.push((selector, properties)),
        }
    }

    /// Merge another rule map into this one
    pub fn merge(&mut self, other: RuleMap) {
        for (selector, properties) in other.rules {
            self.insert(selector, properties);
        }
    }

    /// Properties for a selector
    pub fn get(&self, selector: &str) -> Option<&PropertyMap> {
        self.rules
            .iter()
            .find(|(key, _)| key == selector)
            .map(|(_, properties)| properties)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyMap)> {
        self.rules.iter().map(|(key, props)| (key.as_str(), props))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl IntoIterator for RuleMap {
    type Item = (String, PropertyMap);
    type IntoIter = std::vec::IntoIter<(String, PropertyMap)>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_iter()
    }
}

/// Compile a rule block, optionally scoped under a widget's unique selector
pub fn compile_rules(text: &str, scope: Option<&str>) -> Result<RuleMap, CompileError> {
    let body = dedent(text);
    let source = match scope {
        Some(query) => format!("{}:\n{}", quote_key(query), indent(&body, "    ")),
        None => body,
    };

    let mut rules = RuleMap::new();
    // (indentation, selector) of every open block
    let mut open: Vec<(usize, String)> = Vec::new();
    let mut collected: Vec<(String, PropertyMap)> = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || (trimmed.starts_with('#') && !trimmed.contains(':')) {
            continue;
        }

        let depth = line.len() - line.trim_start().len();
        while open.last().is_some_and(|(level, _)| *level >= depth) {
            open.pop();
        }

        let (key, value) = split_entry(trimmed).ok_or_else(|| CompileError::Style {
            line: idx + 1,
            message: format!("expected 'key: value', found '{}'", trimmed),
        })?;

        if value.is_empty() {
            let selector = match open.last() {
                Some((_, parent)) => join_selector(parent, &key),
                None => key,
            };
            open.push((depth, selector));
            continue;
        }

        let Some((_, selector)) = open.last() else {
            return Err(CompileError::Style {
                line: idx + 1,
                message: format!("property '{}' outside of any selector", key),
            });
        };

        let slot = match collected.iter().position(|(sel, _)| sel == selector) {
            Some(pos) => pos,
            None => {
                collected.push((selector.clone(), PropertyMap::new()));
                collected.len() - 1
            }
        };
        collected[slot].1.insert(key, StyleValue::parse(value));
    }

    for (selector, properties) in collected {
        rules.insert(selector, properties);
    }

    Ok(rules)
}

/// Split `key: value`; the key may be quoted and contain colons
fn split_entry(line: &str) -> Option<(String, &str)> {
    let (key, rest) = if let Some(quote) = line.chars().next().filter(|c| *c == '\'' || *c == '"')
    {
        let end = line[1..].find(quote)? + 1;
        let rest = line[end + 1..].trim_start().strip_prefix(':')?;
        (line[1..end].to_string(), rest)
    } else {
        let (key, rest) = line.split_once(": ").or_else(|| {
            line.strip_suffix(':').map(|key| (key, ""))
        })?;
        (key.trim().to_string(), rest)
    };

    Some((key, rest.trim()))
}

fn join_selector(parent: &str, child: &str) -> String {
    if child.contains('&') {
        return child.replace('&', parent);
    }

    match child.chars().next() {
        Some('.' | '#' | '/' | '@' | ':') => format!("{}{}", parent, child),
        _ => format!("{} {}", parent, child),
    }
}

fn quote_key(key: &str) -> String {
    format!("'{}'", key)
}

fn unquote(raw: &str) -> Option<&str> {
    let first = raw.chars().next()?;
    if (first == '"' || first == '\'') && raw.len() >= 2 && raw.ends_with(first) {
        return Some(&raw[1..raw.len() - 1]);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_flat_rules() {
        let rules = compile_rules(
            "
            Text:
                content_style: bold
                height: 2
            ",
            None,
        )
        .unwrap();

        let text = rules.get("Text").unwrap();
        assert_eq!(text["content_style"], StyleValue::Str("bold".into()));
        assert_eq!(text["height"], StyleValue::Int(2));
    }

    #[test]
    fn test_compile_nested_rules() {
        let rules = compile_rules(
            "
            Link:
                content_style: blue
                /hover:
                    content_style: blue bold
                .active:
                    width: null
            Tower:
                '#root':
                    alignment: [center, center]
            ",
            None,
        )
        .unwrap();

        assert!(rules.get("Link").is_some());
        assert!(rules.get("Link/hover").is_some());
        assert_eq!(rules.get("Link.active").unwrap()["width"], StyleValue::Null);
        assert_eq!(
            rules.get("Tower#root").unwrap()["alignment"],
            StyleValue::List(vec![
                StyleValue::Str("center".into()),
                StyleValue::Str("center".into())
            ])
        );
    }

    #[test]
    fn test_compile_scoped_rules() {
        let rules = compile_rules("gap: 1\nframe: rounded", Some("Tower@3")).unwrap();
        let props = rules.get("Tower@3").unwrap();
        assert_eq!(props["gap"], StyleValue::Int(1));
        assert_eq!(props["frame"], StyleValue::Str("rounded".into()));
    }

    #[test]
    fn test_unscoped_property_is_error() {
        let err = compile_rules("gap: 1", None).unwrap_err();
        assert!(matches!(err, CompileError::Style { line: 1, .. }));
    }

    #[test]
    fn test_merge_replaces_selector() {
        let mut rules = compile_rules("Text:\n  a: 1\n  b: 2", None).unwrap();
        rules.merge(compile_rules("Text:\n  a: 3", None).unwrap());

        let props = rules.get("Text").unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["a"], StyleValue::Int(3));
    }

    #[test]
    fn test_style_value_parsing() {
        assert_eq!(StyleValue::parse("1.5"), StyleValue::Float(1.5));
        assert_eq!(StyleValue::parse("\"#FF0000\""), StyleValue::Str("#FF0000".into()));
        assert_eq!(StyleValue::parse("true"), StyleValue::Bool(true));
    }
}
