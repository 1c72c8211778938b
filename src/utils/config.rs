//! Client configuration

use std::time::Duration;

/// Title used when a page declares none, and always at the root route
pub const DEFAULT_TITLE: &str = "celx";

/// Runtime configuration for a browsing session
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Endpoint the session starts at; its origin anchors `/`-relative URLs
    pub endpoint: String,
    /// Application title
    pub title: String,
    /// Per-request timeout at the transport boundary
    pub timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
    /// Maximum number of history entries kept
    pub history_limit: usize,
    /// Halt all interaction after the first runtime error
    pub fail_fast: bool,
}

impl BrowserConfig {
    /// Create a configuration for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the application title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keep interacting after runtime errors
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/".to_string(),
            title: DEFAULT_TITLE.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("celx/{}", env!("CARGO_PKG_VERSION")),
            history_limit: 256,
            fail_fast: true,
        }
    }
}
