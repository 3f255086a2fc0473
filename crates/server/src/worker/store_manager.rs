//! Versioned store generations.
//!
//! Exactly one generation is current at a time. A new generation is filled
//! during install and becomes current on activate, when every other
//! generation this application owns is deleted.

use std::sync::Arc;

use harbor_client::{Network, canonicalize};
use harbor_core::{Error, Request, RequestMode, ResourceStore, Response, Snapshot};
use serde::{Deserialize, Serialize};
use url::Url;

/// What a populate run wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PopulateReport {
    /// Number of entries written to the generation.
    pub stored: usize,
    /// Optional resources that could not be fetched.
    pub skipped: Vec<String>,
}

pub struct StoreManager {
    store: Arc<dyn ResourceStore>,
    network: Arc<dyn Network>,
    current: String,
    prefix: String,
    origin: Url,
    fallback: Url,
}

impl StoreManager {
    pub fn new(
        store: Arc<dyn ResourceStore>, network: Arc<dyn Network>, current: String, prefix: String, origin: Url,
        fallback: Url,
    ) -> Self {
        Self { store, network, current, prefix, origin, fallback }
    }

    /// Name of the current generation.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Create the current generation if it does not exist yet.
    pub async fn open_current(&self) -> Result<(), Error> {
        self.store.open(&self.current).await
    }

    /// Fetch a list of resources and write every successful response into
    /// the current generation.
    ///
    /// All fetches finish before anything is written, so when the fallback
    /// page fails or is absent the generation is left untouched. Other
    /// failures, unusable URLs included, are logged and skipped.
    pub async fn populate(&self, urls: &[String]) -> Result<PopulateReport, Error> {
        let mut fetched: Vec<(Request, Response)> = Vec::with_capacity(urls.len());
        let mut report = PopulateReport::default();

        for raw in urls {
            let url = match canonicalize(raw, &self.origin) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(url = %raw, error = %e, "precache entry unusable, skipped");
                    report.skipped.push(raw.clone());
                    continue;
                }
            };
            let mandatory = url == self.fallback;
            let request = Request::get(url).with_mode(RequestMode::Cors);

            let failure = match self.network.fetch(&request).await {
                Ok(response) if response.is_ok() => {
                    fetched.push((request, response));
                    continue;
                }
                Ok(response) => format!("status {}", response.status),
                Err(e) => e.to_string(),
            };

            if mandatory {
                return Err(Error::MandatoryResource(format!("{}: {failure}", request.url())));
            }
            tracing::warn!(url = %request.url(), reason = %failure, "precache resource skipped");
            report.skipped.push(request.url().to_string());
        }

        if !fetched.iter().any(|(request, _)| *request.url() == self.fallback) {
            return Err(Error::MandatoryResource(format!("{} is not in the precache list", self.fallback)));
        }

        self.open_current().await?;
        for (request, response) in &fetched {
            let snapshot = Snapshot::capture(request, response);
            match self.store.put(&self.current, &snapshot).await {
                Ok(()) => report.stored += 1,
                Err(e) if *request.url() == self.fallback => return Err(e),
                Err(e) => {
                    tracing::warn!(url = %request.url(), error = %e, "precache write failed");
                    report.skipped.push(request.url().to_string());
                }
            }
        }

        tracing::info!(
            generation = %self.current,
            stored = report.stored,
            skipped = report.skipped.len(),
            "generation populated"
        );
        Ok(report)
    }

    /// Delete every generation owned by this application except `retain`.
    ///
    /// Returns the deleted names. Every deletion has completed when this
    /// resolves.
    pub async fn activate(&self, retain: &str) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.store.generations().await? {
            if name == retain || !name.starts_with(&self.prefix) {
                continue;
            }
            if self.store.delete_generation(&name).await? {
                tracing::info!(generation = %name, "stale generation deleted");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Look up a stored response. Read failures count as misses.
    pub async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.store.get(&self.current, &request.cache_key()).await {
            Ok(hit) => hit.map(|s| s.to_response()),
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "store read failed, treating as miss");
                None
            }
        }
    }

    /// The stored offline page, if the current generation holds one.
    pub async fn lookup_fallback(&self) -> Option<Response> {
        self.lookup(&Request::get(self.fallback.clone())).await
    }

    /// Write a response into the current generation.
    ///
    /// Failures are logged and swallowed; the caller already has its response.
    pub async fn store(&self, request: &Request, response: &Response) {
        let snapshot = Snapshot::capture(request, response);
        if let Err(e) = self.store.put(&self.current, &snapshot).await {
            tracing::warn!(url = %request.url(), error = %e, "store write failed");
        }
    }
}
