//! Markup reader built on quick-xml

use super::node::Node;
use crate::utils::error::CompileError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Reads markup text into a [`Node`] tree
pub struct MarkupParser;

impl MarkupParser {
    /// Parse a complete document or fragment with a single root element
    pub fn parse(content: &str) -> Result<Node, CompileError> {
        let mut reader = Reader::from_str(content);
        let mut stack: Vec<Node> = Vec::new();
        let mut root: Option<Node> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| CompileError::Markup(e.to_string()))?;

            match event {
                Event::Start(start) => {
                    stack.push(Self::element(&start)?);
                }
                Event::Empty(start) => {
                    let node = Self::element(&start)?;
                    Self::close(node, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| CompileError::Markup("unbalanced end tag".into()))?;
                    Self::close(node, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| CompileError::Markup(e.to_string()))?;
                    Self::push_text(&mut stack, &text);
                }
                Event::CData(cdata) => {
                    let raw = cdata.into_inner();
                    Self::push_text(&mut stack, &String::from_utf8_lossy(&raw));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(CompileError::Markup(format!("unclosed <{}>", open.tag)));
        }

        root.ok_or_else(|| CompileError::Markup("document has no root element".into()))
    }

    fn element(start: &BytesStart<'_>) -> Result<Node, CompileError> {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut node = Node::new(tag);

        for attr in start.attributes() {
            let attr = attr.map_err(|e| CompileError::Markup(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| CompileError::Markup(e.to_string()))?;
            node.attributes.push((key, value.into_owned()));
        }

        Ok(node)
    }

    fn close(
        node: Node,
        stack: &mut [Node],
        root: &mut Option<Node>,
    ) -> Result<(), CompileError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                if root.is_some() {
                    return Err(CompileError::Markup(format!(
                        "unexpected second root element <{}>",
                        node.tag
                    )));
                }
                *root = Some(node);
            }
        }
        Ok(())
    }

    /// Character data goes to the open element's text until it has a child,
    /// then to the tail of its last child
    fn push_text(stack: &mut [Node], text: &str) {
        let Some(open) = stack.last_mut() else {
            return;
        };

        let slot = match open.children.last_mut() {
            Some(last) => &mut last.tail,
            None => &mut open.text,
        };

        slot.get_or_insert_with(String::new).push_str(text);
    }
}
