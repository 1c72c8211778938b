//! Transient markup tree produced by the XML reader

/// An element of a fetched markup document.
///
/// Mirrors the element/text/tail model of XML trees: `text` is the character
/// data before the first child, `tail` is the character data following this
/// element inside its parent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    /// Tag name (e.g. `text`, `tower`, `form.counter`)
    pub tag: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Element children in document order
    pub children: Vec<Node>,
    /// Text before the first child
    pub text: Option<String>,
    /// Text after this element's end tag
    pub tail: Option<String>,
}

impl Node {
    /// Create an element with no attributes or content
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder: add an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: set the leading text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: append a child
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Get an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Remove an attribute, returning its value
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(idx).1)
    }

    /// First direct child with the given tag
    pub fn child(&self, tag: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Mutable first direct child with the given tag
    pub fn child_mut(&mut self, tag: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|child| child.tag == tag)
    }

    /// Visit this node and every descendant, parents first
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    /// Text content of the node: direct text if it has any non-blank
    /// characters, otherwise the concatenated tail text of its children.
    ///
    /// Returns `None` when there is no direct text and every child lacks tail
    /// text, which is distinct from `Some("")`.
    pub fn extract_text(&self) -> Option<String> {
        if let Some(text) = &self.text {
            if !text.trim().is_empty() {
                return Some(text.clone());
            }
        }

        let tails: Vec<&str> = self
            .children
            .iter()
            .filter_map(|child| child.tail.as_deref())
            .collect();

        if tails.is_empty() {
            return None;
        }

        Some(tails.concat())
    }
}

/// Remove the common leading run of spaces and tabs from every non-blank line
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let rest = line.trim_start_matches([' ', '\t']);
        let lead = &line[..line.len() - rest.len()];
        margin = Some(match margin {
            None => lead,
            Some(current) => common_prefix(current, lead),
        });
    }
    let margin = margin.unwrap_or("");

    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.strip_prefix(margin).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Longest shared prefix of two space/tab runs
fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let shared = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..shared]
}

/// Prefix every non-blank line with `prefix`
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_direct_text() {
        let node = Node::new("text").with_text("  hello  ");
        assert_eq!(node.extract_text().as_deref(), Some("  hello  "));
    }

    #[test]
    fn test_extract_tail_text_in_order() {
        let mut first = Node::new("style");
        first.tail = Some("one ".into());
        let mut second = Node::new("script");
        second.tail = Some("two".into());
        let node = Node::new("button").with_child(first).with_child(second);

        assert_eq!(node.extract_text().as_deref(), Some("one two"));
    }

    #[test]
    fn test_extract_absent_vs_empty() {
        let bare = Node::new("tower").with_child(Node::new("text"));
        assert_eq!(bare.extract_text(), None);

        let mut child = Node::new("text");
        child.tail = Some(String::new());
        let empty = Node::new("tower").with_child(child);
        assert_eq!(empty.extract_text().as_deref(), Some(""));
    }

    #[test]
    fn test_dedent() {
        let text = "\n    a\n      b\n\n    c";
        assert_eq!(dedent(text), "\na\n  b\n\nc");
    }

    #[test]
    fn test_dedent_mixed_whitespace() {
        assert_eq!(dedent("\n\u{a0}a\n b"), "\n\u{a0}a\n b");
        assert_eq!(dedent("\t  x\n\t y"), " x\ny");
    }

    #[test]
    fn test_set_attr_keeps_order() {
        let mut node = Node::new("text").with_attr("a", "1").with_attr("b", "2");
        node.set_attr("a", "3");
        assert_eq!(
            node.attributes,
            vec![("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]
        );
    }
}
