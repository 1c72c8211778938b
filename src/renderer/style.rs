//! Style rules and cascade

use super::selector::Selector;
use super::tree::WidgetTree;
use super::widget::WidgetId;
use crate::markup::{PropertyMap, RuleMap, StyleValue};
use crate::utils::error::SelectionError;

/// Priority of rules shipped with a document or fragment
pub const DOCUMENT_PRIORITY: i32 = 0;
/// Priority of rules set by scripts at run time
pub const SCRIPT_PRIORITY: i32 = 10;

/// Computed styles for a widget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    properties: PropertyMap,
}

impl ComputedStyle {
    /// Get a property value
    pub fn get(&self, property: &str) -> Option<&StyleValue> {
        self.properties.get(property)
    }

    /// Set a property value
    pub fn set(&mut self, property: impl Into<String>, value: StyleValue) {
        self.properties.insert(property.into(), value);
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[derive(Debug, Clone)]
struct AppliedRule {
    selector: Selector,
    properties: PropertyMap,
    priority: i32,
    order: usize,
}

/// Every rule applied to the live document
#[derive(Debug, Default)]
pub struct RuleBook {
    rules: Vec<AppliedRule>,
    next_order: usize,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply properties for a selector at a priority
    pub fn apply(&mut self, selector: &str, properties: PropertyMap, priority: i32) -> Result<(), SelectionError> {
        let selector = Selector::parse(selector)?;
        self.rules.push(AppliedRule {
            selector,
            properties,
            priority,
            order: self.next_order,
        });
        self.next_order += 1;
        Ok(())
    }

    /// Apply every entry of a compiled rule map
    pub fn apply_map(&mut self, rules: &RuleMap, priority: i32) -> Result<(), SelectionError> {
        for (selector, properties) in rules.iter() {
            self.apply(selector, properties.clone(), priority)?;
        }
        Ok(())
    }

    /// Drop every rule, on page change
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Properties applied for an exact selector text, merged in order
    pub fn rules_for(&self, selector: &str) -> PropertyMap {
        let mut merged = PropertyMap::new();
        for rule in self.rules.iter().filter(|rule| rule.selector.as_str() == selector) {
            merged.extend(rule.properties.clone());
        }
        merged
    }

    /// Cascade: matching rules ordered by priority, then specificity, then
    /// application order. Rules for interaction states (`/hover`) are not
    /// part of the resting style.
    pub fn compute(&self, tree: &WidgetTree, id: WidgetId) -> ComputedStyle {
        let mut matching: Vec<&AppliedRule> = self
            .rules
            .iter()
            .filter(|rule| !rule.selector.has_state() && rule.selector.matches(tree, id))
            .collect();
        matching.sort_by_key(|rule| (rule.priority, rule.selector.specificity(), rule.order));

        let mut style = ComputedStyle::default();
        for rule in matching {
            for (property, value) in &rule.properties {
                style.set(property.clone(), value.clone());
            }
        }
        style
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::compile_rules;
    use crate::renderer::{Widget, WidgetKind};

    #[test]
    fn test_cascade_order() {
        let mut tree = WidgetTree::new();
        let root = tree.construct(Widget::new(WidgetKind::Tower));
        let link = tree.construct(Widget::new(WidgetKind::Link).with_eid("home").with_group("active"));
        tree.append(root, link).unwrap();
        tree.set_root(Some(root));

        let mut book = RuleBook::new();
        let rules = compile_rules(
            "
            Link#home:
                color: red
            Link:
                color: blue
                width: 3
                .active:
                    width: 4
                /hover:
                    color: green
            ",
            None,
        )
        .unwrap();
        book.apply_map(&rules, DOCUMENT_PRIORITY).unwrap();

        let style = book.compute(&tree, link);
        assert_eq!(style.get("color"), Some(&StyleValue::Str("red".into())));
        assert_eq!(style.get("width"), Some(&StyleValue::Int(4)));

        let mut props = PropertyMap::new();
        props.insert("color".into(), StyleValue::Str("white".into()));
        book.apply("Link", props, SCRIPT_PRIORITY).unwrap();
        assert_eq!(
            book.compute(&tree, link).get("color"),
            Some(&StyleValue::Str("white".into()))
        );
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut book = RuleBook::new();
        assert!(book.apply("Text@x", PropertyMap::new(), 0).is_err());
        assert!(book.is_empty());
    }
}
