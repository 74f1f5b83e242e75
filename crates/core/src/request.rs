//! Request descriptor shared between the classifier and the transport.

use serde::{Deserialize, Serialize};
use url::Url;

/// Destination hint declared by the host for an intercepted request.
///
/// Mirrors the hint a browsing runtime attaches to sub-resource requests.
/// `None` means the host declared nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Style,
    Script,
    Font,
    Other,
}

/// An intercepted request, reduced to the fields the core routes on.
///
/// The core never mutates a request; body passthrough for bypass routes is
/// the host runtime's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// HTTP method, uppercase.
    pub method: String,
    /// Full request URL, query string included.
    pub url: Url,
    /// Destination hint, if the host declared one.
    pub destination: Option<Destination>,
    /// Accept header, if present.
    pub accept: Option<String>,
}

impl RequestDescriptor {
    /// A GET request with no destination hint and no accept header.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, destination: None, accept: None }
    }

    /// Build a request with an explicit method.
    pub fn with_method(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, destination: None, accept: None }
    }

    pub fn accept(mut self, accept: &str) -> Self {
        self.accept = Some(accept.to_string());
        self
    }

    pub fn destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// True when the accept header asks for an HTML document.
    pub fn wants_document(&self) -> bool {
        self.accept.as_deref().is_some_and(|a| a.contains("text/html"))
    }
}
