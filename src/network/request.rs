//! HTTP request types

use crate::dsl::Verb;
use crate::utils::{error::NetworkError, Result};
use std::collections::HashMap;
use url::Url;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Method for a remote-call verb
    pub fn from_verb(verb: Verb) -> Option<Self> {
        let method = match verb {
            Verb::Get => Self::Get,
            Verb::Post => Self::Post,
            Verb::Put => Self::Put,
            Verb::Patch => Self::Patch,
            Verb::Delete => Self::Delete,
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|_| NetworkError::InvalidUrl(url.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NetworkError::InvalidUrl(url.to_string()).into());
        }

        Ok(Self {
            method,
            url,
            headers: HashMap::new(),
            body: None,
        })
    }

    /// Create a GET request
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::Get, url)
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the request body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach data the way the method expects it: query parameters for GET,
    /// a JSON body otherwise
    pub fn with_data(mut self, data: &serde_json::Value) -> Self {
        if self.method == Method::Get {
            if let serde_json::Value::Object(map) = data {
                let mut pairs = self.url.query_pairs_mut();
                for (key, value) in map {
                    let value = match value {
                        serde_json::Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    pairs.append_pair(key, &value);
                }
            }
            return self;
        }

        self.headers
            .insert("Content-Type".into(), "application/json".into());
        self.body(data.to_string().into_bytes())
    }

    /// Get the URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Get headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get the body
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_non_http() {
        assert!(Request::get("ftp://example.com").is_err());
        assert!(Request::get("not a url").is_err());
        assert!(Request::get("https://example.com/a").is_ok());
    }

    #[test]
    fn test_get_data_goes_to_query() {
        let request = Request::get("http://localhost/search")
            .unwrap()
            .with_data(&json!({"q": "rust", "page": 2}));
        assert_eq!(request.url().query(), Some("page=2&q=rust"));
        assert!(request.body_bytes().is_none());
    }

    #[test]
    fn test_post_data_goes_to_body() {
        let request = Request::new(Method::Post, "http://localhost/items")
            .unwrap()
            .with_data(&json!({"name": "pen"}));
        assert_eq!(request.body_bytes(), Some(br#"{"name":"pen"}"#.as_slice()));
        assert_eq!(
            request.headers().get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }
}
