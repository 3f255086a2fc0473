//! Scripted platform fakes for worker tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use harbor_client::Network;
use harbor_core::{AppConfig, CacheDb, Error, Request, Response, ResourceStore, Snapshot};
use serde_json::{Value, json};

use super::delegation::{ContextId, Contexts, Envelope, Message, ReplyPort};
use super::{Platform, Worker};

pub const ORIGIN: &str = "https://scanner.example";

/// Network that answers from a route table and records every call.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    bodies: Mutex<Vec<Vec<u8>>>,
    offline: AtomicBool,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Body of the most recent request that carried one.
    pub fn last_body(&self) -> Option<Vec<u8>> {
        self.bodies.lock().unwrap().last().cloned()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait::async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url().to_string();
        self.calls.lock().unwrap().push(url.clone());
        if !request.body().is_empty() {
            self.bodies.lock().unwrap().push(request.body().to_vec());
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }
        let routed = self.routes.lock().unwrap().get(&url).cloned();
        Ok(routed.unwrap_or_else(|| Response::new(404, "not found").with_status_text("Not Found")))
    }
}

/// Foreground contexts that record what they receive and answer from a table.
#[derive(Default)]
pub struct FakeContexts {
    ids: Mutex<Vec<ContextId>>,
    posted: Mutex<Vec<(ContextId, Message)>>,
    answers: Mutex<HashMap<String, Value>>,
    held: Mutex<Vec<ReplyPort>>,
    silent: AtomicBool,
    hidden_lists: AtomicUsize,
    pub claimed: AtomicBool,
    pub skipped_waiting: AtomicBool,
}

impl FakeContexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contexts(ids: &[&str]) -> Self {
        let contexts = Self::default();
        *contexts.ids.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
        contexts
    }

    /// Value replied to `get-storage-value` for `key`.
    pub fn answer(&self, key: &str, value: Value) {
        self.answers.lock().unwrap().insert(key.to_string(), value);
    }

    /// Report no open contexts for the next `calls` enumerations.
    pub fn hide_for(&self, calls: usize) {
        self.hidden_lists.store(calls, Ordering::SeqCst);
    }

    /// Accept requests but never reply.
    pub fn go_silent(&self) {
        self.silent.store(true, Ordering::SeqCst);
    }

    pub fn posted(&self) -> Vec<(ContextId, Message)> {
        self.posted.lock().unwrap().clone()
    }

    pub fn posted_tags(&self) -> Vec<String> {
        self.posted().iter().map(|(_, m)| m.tag().to_string()).collect()
    }

    pub fn backups_posted(&self) -> usize {
        self.posted()
            .iter()
            .filter(|(_, m)| matches!(m, Message::PerformBackupAction { .. }))
            .count()
    }
}

#[async_trait::async_trait]
impl Contexts for FakeContexts {
    async fn list(&self) -> Vec<ContextId> {
        let hidden = self.hidden_lists.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if hidden.is_ok() {
            return Vec::new();
        }
        self.ids.lock().unwrap().clone()
    }

    async fn post(&self, context: &ContextId, envelope: Envelope) -> Result<(), Error> {
        if !self.ids.lock().unwrap().contains(context) {
            return Err(Error::ContextUnavailable(context.clone()));
        }
        self.posted.lock().unwrap().push((context.clone(), envelope.message.clone()));

        let Some(port) = envelope.reply else { return Ok(()) };
        if self.silent.load(Ordering::SeqCst) {
            self.held.lock().unwrap().push(port);
            return Ok(());
        }
        let reply = match &envelope.message {
            Message::GetStorageValue { key } => self.answers.lock().unwrap().get(key).cloned().unwrap_or(Value::Null),
            Message::SetStorageValue { key, value } => {
                self.answers.lock().unwrap().insert(key.clone(), value.clone());
                json!({"ok": true})
            }
            _ => Value::Null,
        };
        let _ = port.send(reply);
        Ok(())
    }

    async fn claim(&self) -> Result<(), Error> {
        self.claimed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn skip_waiting(&self) -> Result<(), Error> {
        self.skipped_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

fn unavailable() -> Error {
    Error::Database(tokio_rusqlite::Error::ConnectionClosed)
}

#[async_trait::async_trait]
impl ResourceStore for FailingStore {
    async fn open(&self, _generation: &str) -> Result<(), Error> {
        Err(unavailable())
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        Err(unavailable())
    }

    async fn delete_generation(&self, _generation: &str) -> Result<bool, Error> {
        Err(unavailable())
    }

    async fn put(&self, _generation: &str, _snapshot: &Snapshot) -> Result<(), Error> {
        Err(unavailable())
    }

    async fn get(&self, _generation: &str, _key: &str) -> Result<Option<Snapshot>, Error> {
        Err(unavailable())
    }

    async fn keys(&self, _generation: &str) -> Result<Vec<String>, Error> {
        Err(unavailable())
    }

    async fn delete(&self, _generation: &str, _key: &str) -> Result<bool, Error> {
        Err(unavailable())
    }
}

pub fn app_url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

pub fn test_config() -> AppConfig {
    AppConfig {
        origin: ORIGIN.to_string(),
        generation_version: "v3".to_string(),
        precache: vec!["/".to_string(), "/offline.html".to_string(), "/app.css".to_string()],
        delegation_timeout_ms: Some(50),
        ..Default::default()
    }
}

/// Network with every precached resource routed to a 200.
pub fn seeded_network() -> FakeNetwork {
    let network = FakeNetwork::new();
    network.route(&app_url("/"), Response::new(200, "<html>home</html>").with_header("content-type", "text/html"));
    network.route(
        &app_url("/offline.html"),
        Response::new(200, "<html>offline</html>").with_header("content-type", "text/html"),
    );
    network.route(&app_url("/app.css"), Response::new(200, "body{}").with_header("content-type", "text/css"));
    network
}

pub struct Harness {
    pub worker: Worker,
    pub network: Arc<FakeNetwork>,
    pub contexts: Arc<FakeContexts>,
    pub db: CacheDb,
}

pub async fn harness_with(config: AppConfig, network: FakeNetwork, contexts: FakeContexts) -> Harness {
    let db = CacheDb::open_in_memory().await.unwrap();
    let network = Arc::new(network);
    let contexts = Arc::new(contexts);
    let platform = Platform {
        network: network.clone(),
        store: Arc::new(db.clone()),
        kv: Arc::new(db.clone()),
        contexts: contexts.clone(),
    };
    let worker = Worker::new(config, platform).unwrap();
    Harness { worker, network, contexts, db }
}

pub async fn harness(network: FakeNetwork, contexts: FakeContexts) -> Harness {
    harness_with(test_config(), network, contexts).await
}

/// Harness with an installed and activated worker.
pub async fn active_harness(contexts: FakeContexts) -> Harness {
    let h = harness(seeded_network(), contexts).await;
    h.worker.install().await.unwrap();
    h.worker.activate().await.unwrap();
    h
}
