//! Interception scope and cache eligibility.
//!
//! Decides which requests the worker handles at all and which network
//! responses may be written into a store generation.

use harbor_core::{AppConfig, Error, Request, Response, ResponseType};
use url::{Origin, Url};

/// Schemes the worker can fetch and store.
pub const FETCHABLE_SCHEMES: &[&str] = &["http", "https"];

/// Origins and URL patterns the worker is responsible for.
#[derive(Debug, Clone)]
pub struct Scope {
    origin_url: Url,
    origin: Origin,
    allowed: Vec<Origin>,
    excluded: Vec<String>,
}

impl Scope {
    pub fn new(origin: &Url, allowed_origins: &[Url], excluded_patterns: &[String]) -> Self {
        Self {
            origin_url: origin.clone(),
            origin: origin.origin(),
            allowed: allowed_origins.iter().map(Url::origin).collect(),
            excluded: excluded_patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Build the scope described by a validated configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let allowed = config
            .allowed_origins
            .iter()
            .map(|o| Url::parse(o).map_err(|e| Error::InvalidUrl(format!("{o}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(&origin, &allowed, &config.excluded_patterns))
    }

    /// The application origin, usable as a base for relative URLs.
    pub fn origin_url(&self) -> &Url {
        &self.origin_url
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    pub fn is_allowed_cross_origin(&self, url: &Url) -> bool {
        let origin = url.origin();
        self.allowed.iter().any(|o| *o == origin)
    }

    /// Whether the worker should answer this request itself.
    ///
    /// Anything else is passed through to the network untouched.
    pub fn intercepts(&self, request: &Request) -> bool {
        let url = request.url();
        FETCHABLE_SCHEMES.contains(&url.scheme()) && (self.is_same_origin(url) || self.is_allowed_cross_origin(url))
    }

    /// Whether a URL is barred from storage (API endpoints, analytics, odd schemes).
    pub fn is_excluded(&self, url: &Url) -> bool {
        if !FETCHABLE_SCHEMES.contains(&url.scheme()) {
            return true;
        }
        let haystack = url.as_str().to_ascii_lowercase();
        self.excluded.iter().any(|p| haystack.contains(p.as_str()))
    }

    /// Cache-eligibility rule applied before storing any network response.
    ///
    /// Only GET responses with status exactly 200 qualify. The response must be
    /// same-origin, or a CORS response from an allow-listed origin, and the URL
    /// must not match the exclusion list.
    pub fn is_cacheable(&self, request: &Request, response: &Response) -> bool {
        if !request.is_get() || response.status != 200 || self.is_excluded(request.url()) {
            return false;
        }
        match response.response_type {
            ResponseType::Basic => true,
            ResponseType::Cors => self.is_allowed_cross_origin(request.url()),
            ResponseType::Opaque | ResponseType::Error => false,
        }
    }

    /// Response type a requester would observe for a network response to `request`.
    pub fn response_type_for(&self, request: &Request) -> ResponseType {
        if self.is_same_origin(request.url()) {
            ResponseType::Basic
        } else if request.mode == harbor_core::RequestMode::NoCors {
            ResponseType::Opaque
        } else {
            ResponseType::Cors
        }
    }
}
