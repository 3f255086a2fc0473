//! Network seam for the worker.
//!
//! ### Network trait
//! - The worker only talks to the network through [`Network`], so tests can
//!   substitute a scripted fake and hosts can plug in their own transport.
//!
//! ### HTTP client
//! - [`FetchClient`] is the reqwest-backed implementation.
//! - It forwards method, headers and body, and labels each response with the
//!   type a requester would observe (`basic`, `cors`, `opaque`).
//!
//! ### Scope
//! - [`Scope`] decides interception and cache eligibility.

pub mod scope;
pub mod url;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use harbor_core::{Error, Request, Response};
use reqwest::{Client, Method};

pub use scope::Scope;
pub use self::url::{UrlError, canonicalize};

/// Anything that can turn a request into a response over the network.
///
/// An `Err` means no response was obtained at all (offline, DNS failure,
/// timeout). HTTP error statuses are successful fetches.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "harbor/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "harbor/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

/// HTTP client implementing [`Network`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    scope: Scope,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig, scope: Scope) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config, scope })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method(), e)))?;

        let mut builder = self.http.request(method, request.url().as_str());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body().is_empty() {
            builder = builder.body(request.body().clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("timed out after {:?}: {}", self.config.timeout, request.url()))
            } else {
                Error::Network(format!("{}: {}", request.url(), e))
            }
        })?;

        let status = response.status();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else { continue };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|v: &mut String| {
                    v.push_str(", ");
                    v.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        tracing::debug!(
            url = %request.url(),
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "network fetch complete"
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            response_type: self.scope.response_type_for(request),
            headers,
            body,
        })
    }
}
