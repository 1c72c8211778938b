//! HTTP client implementation

use super::request::{Method, Request};
use super::response::Response;
use crate::utils::{error::NetworkError, BrowserConfig, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};

/// Media type requested for documents and fragments
pub const ACCEPT_MARKUP: &str = "text/celx";

/// Sends requests and waits for the complete response.
///
/// Called from worker threads, never from the thread owning the tree.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> Result<Response>;
}

/// Blocking HTTP client over reqwest
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    /// Create a client with the configured timeout and user agent
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MARKUP));
        // every request is marked as coming from a celx client
        headers.insert(
            HeaderName::from_static("celx-request"),
            HeaderValue::from_static("true"),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for NetworkClient {
    fn send(&self, request: Request) -> Result<Response> {
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        log::debug!("{} {}", request.method().as_str(), request.url());
        let mut builder = self.client.request(method, request.url().clone());
        for (key, value) in request.headers() {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body_bytes() {
            builder = builder.body(body.to_vec());
        }

        let reply = builder
            .send()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let status = reply.status().as_u16();
        let url = reply.url().to_string();
        let content_type = reply
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = reply.text()?;

        let mut response = Response::new(status, url, body);
        if let Some(content_type) = content_type {
            response.add_header("content-type", content_type);
        }
        Ok(response)
    }
}
