//! Per-class fetch strategies.
//!
//! | class        | strategy                     | on network failure              |
//! |--------------|------------------------------|---------------------------------|
//! | navigation   | network first                | stored offline page, else 503   |
//! | static asset | store first                  | network error as-is             |
//! | other        | network first                | stored copy, else JSON 503/408  |
//!
//! Eligible network responses are written back into the current
//! generation. The requester always gets a concrete response.

use std::sync::Arc;

use harbor_client::{Classification, Network, Scope, classify};
use harbor_core::{Request, Response};
use serde::{Deserialize, Serialize};

use super::store_manager::StoreManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    NetworkFirstOfflineFallback,
    CacheFirst,
    NetworkFirstCacheFallback,
}

impl From<Classification> for Strategy {
    fn from(class: Classification) -> Self {
        match class {
            Classification::Navigation => Strategy::NetworkFirstOfflineFallback,
            Classification::StaticAsset => Strategy::CacheFirst,
            Classification::Other => Strategy::NetworkFirstCacheFallback,
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Network,
    Store,
    Fallback,
    Synthesized,
}

/// A response chosen for an intercepted request.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: Source,
    pub classification: Classification,
}

pub struct StrategySelector {
    manager: Arc<StoreManager>,
    network: Arc<dyn Network>,
    scope: Scope,
}

impl StrategySelector {
    pub fn new(manager: Arc<StoreManager>, network: Arc<dyn Network>, scope: Scope) -> Self {
        Self { manager, network, scope }
    }

    /// Produce a response for an intercepted request.
    pub async fn respond(&self, request: &Request) -> Served {
        let classification = classify(request);
        let (response, source) = match Strategy::from(classification) {
            Strategy::NetworkFirstOfflineFallback => self.navigation(request).await,
            Strategy::CacheFirst => self.static_asset(request).await,
            Strategy::NetworkFirstCacheFallback => self.other(request).await,
        };

        tracing::debug!(
            url = %request.url(),
            class = ?classification,
            source = ?source,
            status = response.status,
            "request served"
        );
        Served { response, source, classification }
    }

    async fn store_if_eligible(&self, request: &Request, response: &Response) {
        if self.scope.is_cacheable(request, response) {
            self.manager.store(request, response).await;
        }
    }

    async fn navigation(&self, request: &Request) -> (Response, Source) {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_if_eligible(request, &response).await;
                (response, Source::Network)
            }
            Err(e) => {
                tracing::info!(url = %request.url(), error = %e, "navigation offline");
                match self.manager.lookup_fallback().await {
                    Some(page) => (page, Source::Fallback),
                    None => (Response::unavailable(), Source::Synthesized),
                }
            }
        }
    }

    async fn static_asset(&self, request: &Request) -> (Response, Source) {
        if let Some(hit) = self.manager.lookup(request).await {
            return (hit, Source::Store);
        }
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_if_eligible(request, &response).await;
                (response, Source::Network)
            }
            Err(e) => {
                tracing::info!(url = %request.url(), error = %e, "static asset unavailable");
                (Response::error(), Source::Synthesized)
            }
        }
    }

    async fn other(&self, request: &Request) -> (Response, Source) {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_if_eligible(request, &response).await;
                (response, Source::Network)
            }
            Err(e) => {
                tracing::info!(url = %request.url(), error = %e, "network failed, trying store");
                if let Some(hit) = self.manager.lookup(request).await {
                    (hit, Source::Store)
                } else if request.accepts_json() {
                    (Response::empty_json(), Source::Synthesized)
                } else {
                    (Response::request_timeout(), Source::Synthesized)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{FailingStore, FakeNetwork, ORIGIN, seeded_network, app_url};
    use harbor_core::{AppConfig, CacheDb, Destination, ResourceStore, ResponseType};
    use url::Url;

    const GEN: &str = "qr-scanner-v3";

    struct Fixture {
        selector: StrategySelector,
        manager: Arc<StoreManager>,
        network: Arc<FakeNetwork>,
        db: CacheDb,
    }

    async fn fixture(network: FakeNetwork) -> Fixture {
        let db = CacheDb::open_in_memory().await.unwrap();
        fixture_with_store(network, Arc::new(db.clone()), db).await
    }

    async fn fixture_with_store(network: FakeNetwork, store: Arc<dyn ResourceStore>, db: CacheDb) -> Fixture {
        let network = Arc::new(network);
        let origin = Url::parse(ORIGIN).unwrap();
        let manager = Arc::new(StoreManager::new(
            store,
            network.clone(),
            GEN.to_string(),
            "qr-scanner-".to_string(),
            origin.clone(),
            origin.join("/offline.html").unwrap(),
        ));
        let scope = Scope::from_config(&AppConfig { origin: ORIGIN.to_string(), ..Default::default() }).unwrap();
        let selector = StrategySelector::new(manager.clone(), network.clone(), scope);
        Fixture { selector, manager, network, db }
    }

    fn get(path: &str) -> Request {
        Request::get(Url::parse(&app_url(path)).unwrap())
    }

    fn nav(path: &str) -> Request {
        Request::navigate(Url::parse(&app_url(path)).unwrap())
    }

    #[tokio::test]
    async fn test_navigation_online_stores_response() {
        let f = fixture(seeded_network()).await;
        let served = f.selector.respond(&nav("/")).await;
        assert_eq!(served.source, Source::Network);
        assert_eq!(served.classification, Classification::Navigation);
        assert_eq!(&served.response.body[..], b"<html>home</html>");
        assert_eq!(f.db.entry_keys(GEN).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_navigation_offline_serves_fallback() {
        let f = fixture(seeded_network()).await;
        f.manager.populate(&["/offline.html".to_string()]).await.unwrap();
        f.network.set_offline(true);

        let served = f.selector.respond(&nav("/some/deep/page")).await;
        assert_eq!(served.source, Source::Fallback);
        assert_eq!(&served.response.body[..], b"<html>offline</html>");
    }

    #[tokio::test]
    async fn test_navigation_offline_without_fallback_is_503() {
        let f = fixture(FakeNetwork::new()).await;
        f.network.set_offline(true);

        let served = f.selector.respond(&nav("/")).await;
        assert_eq!(served.response.status, 503);
        assert_eq!(served.source, Source::Synthesized);
    }

    #[tokio::test]
    async fn test_static_asset_hit_skips_network() {
        let f = fixture(seeded_network()).await;
        f.manager.populate(&["/offline.html".to_string(), "/app.css".to_string()]).await.unwrap();
        let before = f.network.call_count(&app_url("/app.css"));

        let served = f.selector.respond(&get("/app.css")).await;
        assert_eq!(served.source, Source::Store);
        assert_eq!(&served.response.body[..], b"body{}");
        assert_eq!(f.network.call_count(&app_url("/app.css")), before);
    }

    #[tokio::test]
    async fn test_static_asset_miss_fetches_and_stores() {
        let network = FakeNetwork::new();
        network.route(&app_url("/logo.png"), Response::new(200, "png"));
        let f = fixture(network).await;

        let request = get("/logo.png").with_destination(Destination::Image);
        let served = f.selector.respond(&request).await;
        assert_eq!(served.source, Source::Network);

        let again = f.selector.respond(&request).await;
        assert_eq!(again.source, Source::Store);
        assert_eq!(f.network.call_count(&app_url("/logo.png")), 1);
    }

    #[tokio::test]
    async fn test_static_asset_offline_miss_is_network_error() {
        let f = fixture(FakeNetwork::new()).await;
        f.network.set_offline(true);

        let served = f.selector.respond(&get("/missing.js")).await;
        assert_eq!(served.response.response_type, ResponseType::Error);
        assert_eq!(served.response.status, 0);
    }

    #[tokio::test]
    async fn test_static_asset_error_status_returned_as_is() {
        let f = fixture(FakeNetwork::new()).await;
        let served = f.selector.respond(&get("/missing.js")).await;
        assert_eq!(served.response.status, 404);
        assert!(f.db.entry_keys(GEN).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_offline_json_is_empty_503() {
        let f = fixture(FakeNetwork::new()).await;
        f.network.set_offline(true);

        let request = get("/api/scans").with_header("Accept", "application/json");
        let served = f.selector.respond(&request).await;
        assert_eq!(served.response.status, 503);
        assert_eq!(&served.response.body[..], b"{}");
        assert_eq!(served.response.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_other_offline_non_json_is_408() {
        let f = fixture(FakeNetwork::new()).await;
        f.network.set_offline(true);

        let served = f.selector.respond(&get("/status")).await;
        assert_eq!(served.response.status, 408);
        assert_eq!(served.source, Source::Synthesized);
    }

    #[tokio::test]
    async fn test_other_offline_serves_stored_copy() {
        let network = FakeNetwork::new();
        network.route(&app_url("/config"), Response::new(200, "cfg"));
        let f = fixture(network).await;
        assert_eq!(f.selector.respond(&get("/config")).await.source, Source::Network);

        f.network.set_offline(true);
        let served = f.selector.respond(&get("/config")).await;
        assert_eq!(served.source, Source::Store);
        assert_eq!(&served.response.body[..], b"cfg");
    }

    #[tokio::test]
    async fn test_excluded_url_never_stored() {
        let network = FakeNetwork::new();
        network.route(&app_url("/api/scans"), Response::new(200, "[]"));
        let f = fixture(network).await;

        f.selector.respond(&get("/api/scans")).await;
        assert!(f.db.entry_keys(GEN).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_store_still_serves_network() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let f = fixture_with_store(seeded_network(), Arc::new(FailingStore), db).await;

        let served = f.selector.respond(&get("/app.css")).await;
        assert_eq!(served.source, Source::Network);
        assert_eq!(served.response.status, 200);
    }
}
