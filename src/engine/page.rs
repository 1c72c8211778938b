//! Page representation

use crate::script::ScopeRef;
use url::Url;

/// The document currently shown
#[derive(Debug, Clone)]
pub struct Page {
    /// The page URL
    url: Url,
    /// Window title
    title: String,
    /// Attributes of the `<page>` element
    properties: Vec<(String, String)>,
    /// Scope page scripts run in; widget scopes chain to it
    scope: ScopeRef,
}

impl Page {
    /// Create a new page
    pub fn new(url: Url, title: String, properties: Vec<(String, String)>, scope: ScopeRef) -> Self {
        Self {
            url,
            title,
            properties,
            scope,
        }
    }

    /// Get the page URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// A `<page>` attribute
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Document scope
    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }
}
