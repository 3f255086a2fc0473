//! Request and response shapes seen by the worker.
//!
//! These are deliberately small: enough to classify a request, key it in a
//! store generation, and replay a stored response byte for byte.

use std::collections::BTreeMap;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::hash::compute_cache_key;

/// How the requester issued the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

/// What the requester intends to do with the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Style,
    Script,
    Font,
    Manifest,
    #[default]
    Empty,
}

/// An outbound resource request.
///
/// The URL fragment is dropped and the method upper-cased on construction so
/// that two requests for the same resource always share one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl Request {
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        Self {
            method: method.trim().to_ascii_uppercase(),
            url,
            mode: RequestMode::default(),
            destination: Destination::default(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// A plain GET, the default request shape.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A top-level document load.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_mode(RequestMode::Navigate).with_destination(Destination::Document)
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Attach a header. Names are stored lower-cased.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Identity of this request inside a store generation.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, self.url.as_str())
    }

    /// Whether the requester expects a JSON body back.
    pub fn accepts_json(&self) -> bool {
        self.header("accept").is_some_and(|v| v.contains("application/json"))
            || self.url.path().ends_with(".json")
    }
}

/// Origin class of a response, as the requester would observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response with full access to status and body.
    Basic,
    /// Cross-origin response shared via CORS.
    Cors,
    /// Cross-origin response whose contents are hidden.
    Opaque,
    /// A network error.
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(ResponseType::Basic),
            "cors" => Some(ResponseType::Cors),
            "opaque" => Some(ResponseType::Opaque),
            "error" => Some(ResponseType::Error),
            _ => None,
        }
    }
}

/// A response handed back to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl Response {
    /// A same-origin response with the given status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: default_status_text(status).to_string(),
            response_type: ResponseType::Basic,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_status_text(mut self, text: &str) -> Self {
        self.status_text = text.to_string();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Status in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The network-error response: status 0, no headers, no body.
    pub fn error() -> Self {
        Self {
            status: 0,
            status_text: String::new(),
            response_type: ResponseType::Error,
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Minimal page served when a navigation has neither network nor fallback.
    pub fn unavailable() -> Self {
        Self::new(503, "Service unavailable: you appear to be offline.")
            .with_header("content-type", "text/plain; charset=utf-8")
    }

    /// Typed empty body for JSON requests that could not be satisfied.
    pub fn empty_json() -> Self {
        Self::new(503, "{}").with_header("content-type", "application/json")
    }

    /// Placeholder for any other request that could not be satisfied.
    pub fn request_timeout() -> Self {
        Self::new(408, Bytes::new()).with_status_text("Request timed out.")
    }
}

fn default_status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
