//! Navigation helpers: history, endpoint resolution and resource inlining

use crate::markup::{MarkupParser, Node};
use crate::utils::error::{CompileError, NetworkError, Result};
use std::collections::VecDeque;
use url::Url;

/// Tags whose `src` attribute is fetched and inlined
const SOURCEABLE: [&str; 3] = ["style", "script", "complib"];

/// Libraries sourcing libraries deeper than this are rejected
const MAX_INLINE_DEPTH: usize = 16;

/// Visited destinations with a back/forward offset.
///
/// The offset counts steps back from the newest entry.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    offset: usize,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            offset: 0,
            limit: limit.max(1),
        }
    }

    /// Record a destination and reset the offset
    pub fn push(&mut self, destination: impl Into<String>) {
        self.entries.push_back(destination.into());
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.offset = 0;
    }

    /// Step back, stopping at the oldest entry
    pub fn back(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.offset = (self.offset + 1).min(self.entries.len() - 1);
        self.current()
    }

    /// Step forward, stopping at the newest entry
    pub fn forward(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.offset = self.offset.saturating_sub(1);
        self.current()
    }

    /// Entry at the current offset
    pub fn current(&self) -> Option<&str> {
        let idx = self.entries.len().checked_sub(self.offset + 1)?;
        self.entries.get(idx).map(String::as_str)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve an endpoint against the session's current URL.
///
/// `/`-prefixed endpoints keep only the scheme and host of `base`; absolute
/// URLs are used as given.
pub fn resolve_endpoint(base: &Url, endpoint: &str) -> Result<Url> {
    let invalid = |_| NetworkError::InvalidUrl(endpoint.to_string());

    if endpoint.starts_with('/') {
        return Ok(base.join(endpoint).map_err(invalid)?);
    }

    match Url::parse(endpoint) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(base.join(endpoint).map_err(invalid)?),
        Err(_) => Err(NetworkError::InvalidUrl(endpoint.to_string()).into()),
    }
}

/// Replace every `src` on `style`, `script` and `complib` nodes with the
/// fetched resource.
///
/// Style and script bodies become the node's text. A library body is parsed;
/// its children are appended and its attributes merged into the node.
pub fn inline_sources(node: &mut Node, fetch: &mut dyn FnMut(&str) -> Result<String>) -> Result<()> {
    inline_at(node, fetch, 0)
}

fn inline_at(node: &mut Node, fetch: &mut dyn FnMut(&str) -> Result<String>, depth: usize) -> Result<()> {
    if SOURCEABLE.contains(&node.tag.as_str()) {
        if let Some(src) = node.remove_attr("src") {
            log::debug!("inlining <{}> from {}", node.tag, src);
            let body = fetch(&src)?;

            if node.tag == "complib" {
                if depth >= MAX_INLINE_DEPTH {
                    return Err(CompileError::MalformedComponent {
                        name: src,
                        reason: "component libraries nested too deeply".into(),
                    }
                    .into());
                }
                let mut library = MarkupParser::parse(&body)?;
                inline_at(&mut library, fetch, depth + 1)?;
                node.children.extend(library.children);
                for (key, value) in library.attributes {
                    node.set_attr(key, value);
                }
            } else {
                node.text = Some(body);
            }
        }
    }

    for child in &mut node.children {
        inline_at(child, fetch, depth)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_history_offsets() {
        let mut history = History::new(10);
        history.push("/a");
        history.push("/b");
        history.push("/c");

        assert_eq!(history.back(), Some("/b"));
        assert_eq!(history.back(), Some("/a"));
        assert_eq!(history.back(), Some("/a"));
        assert_eq!(history.forward(), Some("/b"));

        history.push("/d");
        assert_eq!(history.offset(), 0);
        assert_eq!(history.current(), Some("/d"));
    }

    #[test]
    fn test_history_limit() {
        let mut history = History::new(2);
        history.push("/a");
        history.push("/b");
        history.push("/c");
        assert_eq!(history.len(), 2);
        assert_eq!(history.back(), Some("/b"));
        assert_eq!(history.back(), Some("/b"));
    }

    #[test]
    fn test_resolve_origin_relative() {
        let base = Url::parse("https://example.com/app/page?x=1").unwrap();
        assert_eq!(
            resolve_endpoint(&base, "/items").unwrap().as_str(),
            "https://example.com/items"
        );
        assert_eq!(
            resolve_endpoint(&base, "http://other.org/a").unwrap().as_str(),
            "http://other.org/a"
        );
        assert_eq!(
            resolve_endpoint(&base, "next").unwrap().as_str(),
            "https://example.com/app/next"
        );
    }

    #[test]
    fn test_inline_sources() {
        let mut document = MarkupParser::parse(
            r#"<page><style src="/s.yaml"/><complib src="/lib.xml"/><tower/></page>"#,
        )
        .unwrap();

        let mut fetched = Vec::new();
        inline_sources(&mut document, &mut |src| {
            fetched.push(src.to_string());
            Ok(match src {
                "/s.yaml" => "Text:\n  height: 1".to_string(),
                "/lib.xml" => {
                    r#"<complib namespace="ui"><component name="card"><tower/></component></complib>"#
                        .to_string()
                }
                _ => unreachable!(),
            })
        })
        .unwrap();

        assert_eq!(fetched, vec!["/s.yaml", "/lib.xml"]);
        assert_eq!(document.children[0].text.as_deref(), Some("Text:\n  height: 1"));
        assert_eq!(document.children[0].attr("src"), None);
        let library = &document.children[1];
        assert_eq!(library.attr("namespace"), Some("ui"));
        assert_eq!(library.children[0].tag, "component");
    }
}
