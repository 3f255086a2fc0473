//! Cross-context delegation.
//!
//! The worker runs without the capabilities a foreground context holds
//! (in-memory application state, backup credentials). Two exchange shapes
//! bridge that gap:
//!
//! - request/response: one message with a reply port, awaiting exactly one
//!   reply from the first open context, with an optional caller deadline;
//! - notification: fire-and-forget, broadcast to every open context.
//!
//! When no context answers, reads and writes fall back to the worker's own
//! durable key-value store so background work can still make progress.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use harbor_core::{Error, KeyValueStore};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

/// Identifier of an open foreground context.
pub type ContextId = String;

/// Channel a foreground context answers a request on.
pub type ReplyPort = oneshot::Sender<Value>;

/// Tagged message exchanged between the worker and foreground contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    /// Read a value from the receiver's storage.
    GetStorageValue { key: String },
    /// Write a value into the receiver's storage.
    SetStorageValue { key: String, value: Value },
    /// Ask a foreground context to run a backup it holds credentials for.
    PerformBackupAction { reason: String, item_count: u64, requested_at: String },
    /// Ask the worker whether the network is reachable.
    ConnectivityCheck,
    /// Ask the worker to evict stale entries.
    CleanupCache {
        #[serde(default)]
        max_age_secs: Option<u64>,
    },
}

impl Message {
    pub fn tag(&self) -> &'static str {
        match self {
            Message::GetStorageValue { .. } => "get-storage-value",
            Message::SetStorageValue { .. } => "set-storage-value",
            Message::PerformBackupAction { .. } => "perform-backup-action",
            Message::ConnectivityCheck => "connectivity-check",
            Message::CleanupCache { .. } => "cleanup-cache",
        }
    }
}

/// A message plus, for request/response exchanges, the port to answer on.
#[derive(Debug)]
pub struct Envelope {
    pub message: Message,
    pub reply: Option<ReplyPort>,
}

impl Envelope {
    pub fn notification(message: Message) -> Self {
        Self { message, reply: None }
    }

    pub fn request(message: Message) -> (Self, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        (Self { message, reply: Some(tx) }, rx)
    }
}

/// The host's view of open foreground contexts.
#[async_trait::async_trait]
pub trait Contexts: Send + Sync {
    /// Currently open foreground contexts, in the host's preferred order.
    async fn list(&self) -> Vec<ContextId>;

    /// Deliver an envelope to one context.
    async fn post(&self, context: &ContextId, envelope: Envelope) -> Result<(), Error>;

    /// Take control of every open context.
    async fn claim(&self) -> Result<(), Error>;

    /// Supersede any previously waiting generation without waiting for
    /// its contexts to close.
    async fn skip_waiting(&self) -> Result<(), Error>;
}

/// A host with no foreground contexts at all.
pub struct NoContexts;

#[async_trait::async_trait]
impl Contexts for NoContexts {
    async fn list(&self) -> Vec<ContextId> {
        Vec::new()
    }

    async fn post(&self, context: &ContextId, _envelope: Envelope) -> Result<(), Error> {
        Err(Error::ContextUnavailable(format!("no such context: {context}")))
    }

    async fn claim(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn skip_waiting(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Await a future, optionally bounded by a caller-supplied deadline.
pub async fn with_deadline<T>(deadline: Option<Duration>, fut: impl Future<Output = T>) -> Result<T, Error> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::DelegationTimeout(format!("no reply within {}ms", limit.as_millis()))),
        None => Ok(fut.await),
    }
}

/// Request/response and notification channels to foreground contexts.
pub struct Delegation {
    contexts: Arc<dyn Contexts>,
    kv: Arc<dyn KeyValueStore>,
}

impl Delegation {
    pub fn new(contexts: Arc<dyn Contexts>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self { contexts, kv }
    }

    pub async fn has_context(&self) -> bool {
        !self.contexts.list().await.is_empty()
    }

    /// Send a request to the first open context and await its single reply.
    ///
    /// Without a deadline this waits for as long as the context takes.
    pub async fn request(&self, message: Message, deadline: Option<Duration>) -> Result<Value, Error> {
        let tag = message.tag();
        let context = self
            .contexts
            .list()
            .await
            .into_iter()
            .next()
            .ok_or_else(|| Error::ContextUnavailable(format!("no foreground context for {tag}")))?;

        let (envelope, reply) = Envelope::request(message);
        self.contexts.post(&context, envelope).await?;

        with_deadline(deadline, reply)
            .await?
            .map_err(|_| Error::ContextUnavailable(format!("context {context} closed before replying to {tag}")))
    }

    /// Read a value, preferring a foreground context over the durable store.
    pub async fn get_value(&self, key: &str, deadline: Option<Duration>) -> Result<Option<Value>, Error> {
        let message = Message::GetStorageValue { key: key.to_string() };
        match self.request(message, deadline).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::debug!(key, error = %e, "delegated read unavailable, using durable store");
                self.kv.get(key).await
            }
        }
    }

    /// Write a value through a foreground context, or into the durable store.
    pub async fn set_value(&self, key: &str, value: Value, deadline: Option<Duration>) -> Result<(), Error> {
        let message = Message::SetStorageValue { key: key.to_string(), value: value.clone() };
        match self.request(message, deadline).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::debug!(key, error = %e, "delegated write unavailable, using durable store");
                self.kv.set(key, value).await
            }
        }
    }

    /// Broadcast a notification to every open context.
    ///
    /// Returns how many contexts accepted it. Exactly-once handling is the
    /// receivers' concern.
    pub async fn notify(&self, message: Message) -> usize {
        let mut delivered = 0;
        for context in self.contexts.list().await {
            match self.contexts.post(&context, Envelope::notification(message.clone())).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(context = %context, tag = message.tag(), error = %e, "notification not delivered"),
            }
        }
        delivered
    }
}
