//! The offline worker engine.
//!
//! ### Composition
//! - [`Worker`] wires the lifecycle controller, strategy selector, evictor and
//!   delegation layer to one [`Platform`].
//! - The platform is the only way in or out: network, resource store, durable
//!   key-value store and foreground contexts are all trait objects, so the
//!   engine runs the same against the real host and against test fakes.
//!
//! ### Entry points
//! - `install` / `activate`: lifecycle transitions.
//! - `handle_fetch`: intercepted requests.
//! - `handle_sync`: background triggers by tag.
//! - `handle_message`: messages from foreground contexts.

pub mod backup;
pub mod delegation;
pub mod dispatch;
pub mod evictor;
pub mod lifecycle;
pub mod store_manager;
pub mod strategy;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use harbor_client::{Network, Scope, canonicalize};
use harbor_core::{AppConfig, Error, KeyValueStore, Request, ResourceStore};

use backup::BackupCoordinator;
use delegation::{Contexts, Delegation};
use evictor::Evictor;
use lifecycle::{LifecycleController, Phase};
use store_manager::{PopulateReport, StoreManager};
use strategy::{Served, StrategySelector};

/// Host capabilities the worker runs against.
#[derive(Clone)]
pub struct Platform {
    pub network: Arc<dyn Network>,
    pub store: Arc<dyn ResourceStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub contexts: Arc<dyn Contexts>,
}

/// Result of offering a request to the worker.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not ours; the host sends it to the network untouched.
    PassThrough,
    Respond(Served),
}

pub struct Worker {
    config: AppConfig,
    scope: Scope,
    network: Arc<dyn Network>,
    store: Arc<dyn ResourceStore>,
    kv: Arc<dyn KeyValueStore>,
    manager: Arc<StoreManager>,
    lifecycle: LifecycleController,
    selector: StrategySelector,
    evictor: Evictor,
    backup: BackupCoordinator,
}

impl Worker {
    pub fn new(config: AppConfig, platform: Platform) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;

        let scope = Scope::from_config(&config)?;
        let origin = scope.origin_url().clone();
        let fallback = canonicalize(&config.fallback_path, &origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let generation = config.generation_name();

        let manager = Arc::new(StoreManager::new(
            platform.store.clone(),
            platform.network.clone(),
            generation.clone(),
            config.generation_prefix.clone(),
            origin,
            fallback,
        ));
        let lifecycle = LifecycleController::new(manager.clone(), platform.contexts.clone(), config.precache.clone());
        let selector = StrategySelector::new(manager.clone(), platform.network.clone(), scope.clone());
        let evictor = Evictor::new(platform.store.clone(), generation);
        let delegation = Arc::new(Delegation::new(platform.contexts.clone(), platform.kv.clone()));
        let backup = BackupCoordinator::new(delegation, platform.kv.clone(), config.delegation_timeout());

        Ok(Self {
            config,
            scope,
            network: platform.network,
            store: platform.store,
            kv: platform.kv,
            manager,
            lifecycle,
            selector,
            evictor,
            backup,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn generation(&self) -> &str {
        self.manager.current()
    }

    pub async fn phase(&self) -> Phase {
        self.lifecycle.phase().await
    }

    /// Every generation present in the resource store.
    pub async fn generations(&self) -> Result<Vec<String>, Error> {
        self.store.generations().await
    }

    /// Number of entries stored under a generation.
    pub async fn entry_count(&self, generation: &str) -> Result<usize, Error> {
        Ok(self.store.keys(generation).await?.len())
    }

    pub async fn install(&self) -> Result<PopulateReport, Error> {
        self.lifecycle.install().await
    }

    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.lifecycle.activate().await
    }

    /// Offer an intercepted request to the worker.
    ///
    /// Only an active worker answers, and only for in-scope requests.
    pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
        if self.phase().await != Phase::Active || !self.scope.intercepts(request) {
            return FetchOutcome::PassThrough;
        }
        FetchOutcome::Respond(self.selector.respond(request).await)
    }

    /// Remove entries older than `max_age`, or the configured default.
    ///
    /// A zero max-age would wipe the fallback page, so it is rejected.
    pub async fn evict(&self, max_age: Option<Duration>) -> Result<usize, Error> {
        if max_age.is_some_and(|age| age.is_zero()) {
            return Err(Error::InvalidInput("max age must be greater than 0".into()));
        }
        self.evictor.evict(max_age.unwrap_or_else(|| self.config.max_age())).await
    }
}
