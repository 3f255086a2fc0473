//! Background triggers and inbound messages.
//!
//! Triggers arrive as bare tags from the host scheduler. Messages arrive
//! from foreground contexts, optionally with a reply port.

use std::time::Duration;

use harbor_core::{Error, Request};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Worker;
use super::backup::BackupOutcome;
use super::delegation::{Envelope, Message};

pub const SYNC_SCANS: &str = "sync-scans";
pub const AUTO_BACKUP: &str = "auto-backup";

/// Background triggers the worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Data synchronization; also retries a backup left pending.
    SyncScans,
    AutoBackup,
}

impl Trigger {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            SYNC_SCANS => Some(Trigger::SyncScans),
            AUTO_BACKUP => Some(Trigger::AutoBackup),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Trigger::SyncScans => SYNC_SCANS,
            Trigger::AutoBackup => AUTO_BACKUP,
        }
    }
}

/// How a background trigger resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SyncOutcome {
    /// Tag not recognized; nothing ran.
    Ignored,
    /// Data sync ran. `backup` is set when a pending backup was retried.
    Synced { backup: Option<BackupOutcome> },
    Backup(BackupOutcome),
}

impl Worker {
    /// Run the background work registered under `tag`.
    ///
    /// Unknown tags resolve immediately as [`SyncOutcome::Ignored`].
    pub async fn handle_sync(&self, tag: &str) -> Result<SyncOutcome, Error> {
        let Some(trigger) = Trigger::from_tag(tag) else {
            tracing::info!(tag, "unknown trigger tag ignored");
            return Ok(SyncOutcome::Ignored);
        };

        let outcome = match trigger {
            Trigger::SyncScans => {
                let backup = self.backup.retry_pending(trigger.tag()).await?;
                SyncOutcome::Synced { backup }
            }
            Trigger::AutoBackup => SyncOutcome::Backup(self.backup.run(trigger.tag()).await?),
        };
        tracing::info!(tag, outcome = ?outcome, "trigger handled");
        Ok(outcome)
    }

    /// Handle one message from a foreground context and produce its reply.
    pub async fn handle_message(&self, message: Message) -> Value {
        let tag = message.tag();
        tracing::debug!(tag, "message received");
        match message {
            Message::GetStorageValue { key } => match self.kv.get(&key).await {
                Ok(value) => value.unwrap_or(Value::Null),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "storage read failed");
                    Value::Null
                }
            },
            Message::SetStorageValue { key, value } => match self.kv.set(&key, value).await {
                Ok(()) => json!({"ok": true}),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "storage write failed");
                    json!({"ok": false, "error": e.to_string()})
                }
            },
            Message::ConnectivityCheck => json!({"online": self.is_online().await}),
            Message::CleanupCache { max_age_secs } => match self.evict(max_age_secs.map(Duration::from_secs)).await {
                Ok(removed) => json!({"removed": removed}),
                Err(e) => {
                    tracing::warn!(error = %e, "cleanup failed");
                    json!({"removed": 0, "error": e.to_string()})
                }
            },
            Message::PerformBackupAction { .. } => {
                tracing::warn!(tag, "message is only meaningful to foreground contexts");
                json!({"ok": false, "error": format!("{tag} is not handled by the worker")})
            }
        }
    }

    /// Handle an envelope, answering on its reply port if it has one.
    pub async fn handle_envelope(&self, envelope: Envelope) {
        let reply = self.handle_message(envelope.message).await;
        if let Some(port) = envelope.reply
            && port.send(reply).is_err()
        {
            tracing::debug!("reply port closed before the answer was sent");
        }
    }

    async fn is_online(&self) -> bool {
        let probe = Request::get(self.scope.origin_url().clone());
        match self.network.fetch(&probe).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "connectivity probe failed");
                false
            }
        }
    }
}
