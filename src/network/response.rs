//! HTTP response types

use std::collections::HashMap;

/// Content types compiled as markup
const MARKUP_TYPES: [&str; 4] = ["text/celx", "text/xml", "application/xml", "application/celx+xml"];

/// HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    url: String,
    headers: HashMap<String, String>,
    body: String,
}

impl Response {
    /// Create a new response
    pub fn new(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Builder: add a header; names are stored lowercase
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.add_header(key, value);
        self
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// URL the response was fetched from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Check if the response was successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Take the body
    pub fn into_body(self) -> String {
        self.body
    }

    /// Get the content type from headers
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Whether the body should be compiled as markup rather than shown as text
    pub fn is_markup(&self) -> bool {
        let Some(content_type) = self.content_type() else {
            return false;
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        MARKUP_TYPES.contains(&essence.as_str())
    }

    /// Get response headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get a specific header
    pub fn header(&self, key: &str) -> Option<&String> {
        self.headers.get(&key.to_ascii_lowercase())
    }

    /// Add a header
    pub fn add_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_detection() {
        let response = Response::new(200, "http://x/", "<text/>")
            .with_header("Content-Type", "text/celx; charset=utf-8");
        assert!(response.is_markup());
        assert!(!Response::new(200, "http://x/", "plain").is_markup());
        assert!(
            !Response::new(200, "http://x/", "{}")
                .with_header("content-type", "application/json")
                .is_markup()
        );
    }

    #[test]
    fn test_status_ranges() {
        assert!(Response::new(204, "http://x/", "").is_success());
        assert!(!Response::new(404, "http://x/", "").is_success());
        assert!(!Response::new(301, "http://x/", "").is_success());
    }
}
