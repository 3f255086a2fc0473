//! Auto-backup coordination.
//!
//! The worker never performs a backup itself. It decides whether one is due
//! and hands it to a foreground context:
//!
//! ```text
//! check-enabled --off--> Disabled
//!      | on
//! check-new-data --no--> NoNewData
//!      | yes
//! reachable-context --none--> MarkedPending (retried on the next sync)
//!      | some
//! Delegated (count and time recorded, pending cleared)
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use harbor_core::cache::kv::{AUTO_BACKUP_ENABLED, ITEM_COUNT, LAST_BACKUP_COUNT, LAST_BACKUP_TIME, PENDING_BACKUP};
use harbor_core::{Error, KeyValueStore};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::delegation::{Delegation, Message};

/// Where a backup run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum BackupOutcome {
    /// Auto-backup is switched off.
    Disabled,
    /// Nothing new since the last delivered backup.
    NoNewData { item_count: u64, last_backup_count: u64 },
    /// Handed to this many foreground contexts.
    Delegated { contexts: usize, item_count: u64 },
    /// No context could take it; flagged for a later sync.
    MarkedPending { item_count: u64 },
}

pub struct BackupCoordinator {
    delegation: Arc<Delegation>,
    kv: Arc<dyn KeyValueStore>,
    deadline: Option<Duration>,
}

/// Item count from a stored value: a number, or a list of items.
fn as_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::Array(items)) => items.len() as u64,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl BackupCoordinator {
    pub fn new(delegation: Arc<Delegation>, kv: Arc<dyn KeyValueStore>, deadline: Option<Duration>) -> Self {
        Self { delegation, kv, deadline }
    }

    async fn enabled(&self) -> Result<bool, Error> {
        Ok(match self.kv.get(AUTO_BACKUP_ENABLED).await? {
            Some(Value::Bool(flag)) => flag,
            Some(Value::String(s)) => s != "false",
            _ => true,
        })
    }

    pub async fn is_pending(&self) -> Result<bool, Error> {
        Ok(matches!(self.kv.get(PENDING_BACKUP).await?, Some(Value::Bool(true))))
    }

    /// Run one backup check.
    ///
    /// Every path resolves. `Err` is only returned when the durable store
    /// itself is unavailable.
    pub async fn run(&self, reason: &str) -> Result<BackupOutcome, Error> {
        if !self.enabled().await? {
            tracing::debug!(reason, "auto-backup disabled");
            return Ok(BackupOutcome::Disabled);
        }

        let item_count = as_count(self.delegation.get_value(ITEM_COUNT, self.deadline).await?.as_ref());
        let last_backup_count = as_count(self.kv.get(LAST_BACKUP_COUNT).await?.as_ref());
        if item_count <= last_backup_count {
            tracing::debug!(reason, item_count, last_backup_count, "no new data to back up");
            return Ok(BackupOutcome::NoNewData { item_count, last_backup_count });
        }

        if !self.delegation.has_context().await {
            self.kv.set(PENDING_BACKUP, Value::Bool(true)).await?;
            tracing::info!(reason, item_count, "no foreground context, backup marked pending");
            return Ok(BackupOutcome::MarkedPending { item_count });
        }

        let requested_at = Utc::now().to_rfc3339();
        let message =
            Message::PerformBackupAction { reason: reason.to_string(), item_count, requested_at: requested_at.clone() };
        let contexts = self.delegation.notify(message).await;
        if contexts == 0 {
            self.kv.set(PENDING_BACKUP, Value::Bool(true)).await?;
            tracing::info!(reason, item_count, "backup not delivered, marked pending");
            return Ok(BackupOutcome::MarkedPending { item_count });
        }

        self.kv.set(LAST_BACKUP_COUNT, json!(item_count)).await?;
        self.kv.set(LAST_BACKUP_TIME, json!(requested_at)).await?;
        self.kv.remove(PENDING_BACKUP).await?;
        if let Err(e) = self.delegation.set_value(LAST_BACKUP_TIME, json!(requested_at), self.deadline).await {
            tracing::warn!(reason, error = %e, "last backup time not mirrored to foreground");
        }
        tracing::info!(reason, item_count, contexts, "backup delegated");
        Ok(BackupOutcome::Delegated { contexts, item_count })
    }

    /// Re-deliver a backup left pending by an earlier run.
    pub async fn retry_pending(&self, reason: &str) -> Result<Option<BackupOutcome>, Error> {
        if !self.is_pending().await? {
            return Ok(None);
        }
        self.run(reason).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::FakeContexts;
    use harbor_core::CacheDb;

    async fn coordinator(contexts: Arc<FakeContexts>) -> (BackupCoordinator, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let kv: Arc<dyn KeyValueStore> = Arc::new(db.clone());
        let delegation = Arc::new(Delegation::new(contexts, kv.clone()));
        (BackupCoordinator::new(delegation, kv, Some(Duration::from_millis(50))), db)
    }

    #[test]
    fn test_as_count() {
        assert_eq!(as_count(Some(&json!(7))), 7);
        assert_eq!(as_count(Some(&json!([1, 2, 3]))), 3);
        assert_eq!(as_count(Some(&json!("4"))), 4);
        assert_eq!(as_count(Some(&json!(null))), 0);
        assert_eq!(as_count(None), 0);
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let contexts = Arc::new(FakeContexts::with_contexts(&["window-1"]));
        let (backup, db) = coordinator(contexts.clone()).await;
        db.kv_set(AUTO_BACKUP_ENABLED, &json!(false)).await.unwrap();

        assert_eq!(backup.run("auto-backup").await.unwrap(), BackupOutcome::Disabled);
        assert!(contexts.posted().is_empty());
    }

    #[tokio::test]
    async fn test_no_new_data() {
        let contexts = Arc::new(FakeContexts::with_contexts(&["window-1"]));
        contexts.answer(ITEM_COUNT, json!(5));
        let (backup, db) = coordinator(contexts.clone()).await;
        db.kv_set(LAST_BACKUP_COUNT, &json!(5)).await.unwrap();

        let outcome = backup.run("auto-backup").await.unwrap();
        assert_eq!(outcome, BackupOutcome::NoNewData { item_count: 5, last_backup_count: 5 });
        assert_eq!(contexts.backups_posted(), 0);
    }

    #[tokio::test]
    async fn test_new_data_with_context_delegates_once() {
        let contexts = Arc::new(FakeContexts::with_contexts(&["window-1"]));
        contexts.answer(ITEM_COUNT, json!(8));
        let (backup, db) = coordinator(contexts.clone()).await;
        db.kv_set(LAST_BACKUP_COUNT, &json!(5)).await.unwrap();
        db.kv_set(PENDING_BACKUP, &json!(true)).await.unwrap();

        let outcome = backup.run("auto-backup").await.unwrap();
        assert_eq!(outcome, BackupOutcome::Delegated { contexts: 1, item_count: 8 });
        assert_eq!(contexts.backups_posted(), 1);
        assert_eq!(
            contexts.posted_tags(),
            vec!["get-storage-value".to_string(), "perform-backup-action".to_string(), "set-storage-value".to_string()]
        );
        assert_eq!(db.kv_get(LAST_BACKUP_COUNT).await.unwrap(), Some(json!(8)));
        assert!(db.kv_get(LAST_BACKUP_TIME).await.unwrap().is_some());
        assert_eq!(db.kv_get(PENDING_BACKUP).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_new_data_without_context_marks_pending() {
        let contexts = Arc::new(FakeContexts::new());
        let (backup, db) = coordinator(contexts.clone()).await;
        db.kv_set(ITEM_COUNT, &json!(3)).await.unwrap();

        let outcome = backup.run("auto-backup").await.unwrap();
        assert_eq!(outcome, BackupOutcome::MarkedPending { item_count: 3 });
        assert_eq!(db.kv_get(PENDING_BACKUP).await.unwrap(), Some(json!(true)));
        assert_eq!(db.kv_get(LAST_BACKUP_COUNT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_pending_flag_lands_in_durable_store_when_context_opens_late() {
        let contexts = Arc::new(FakeContexts::with_contexts(&["window-1"]));
        contexts.hide_for(2);
        let (backup, db) = coordinator(contexts.clone()).await;
        db.kv_set(ITEM_COUNT, &json!(3)).await.unwrap();

        let outcome = backup.run("auto-backup").await.unwrap();
        assert_eq!(outcome, BackupOutcome::MarkedPending { item_count: 3 });
        assert_eq!(db.kv_get(PENDING_BACKUP).await.unwrap(), Some(json!(true)));
        assert!(backup.is_pending().await.unwrap());
        assert!(contexts.posted().is_empty());
    }

    #[tokio::test]
    async fn test_silent_context_falls_back_to_mirrored_count() {
        let contexts = Arc::new(FakeContexts::with_contexts(&["window-1"]));
        contexts.go_silent();
        let (backup, db) = coordinator(contexts.clone()).await;
        db.kv_set(ITEM_COUNT, &json!(2)).await.unwrap();

        let outcome = backup.run("auto-backup").await.unwrap();
        assert_eq!(outcome, BackupOutcome::Delegated { contexts: 1, item_count: 2 });
    }

    #[tokio::test]
    async fn test_retry_pending_only_when_flagged() {
        let contexts = Arc::new(FakeContexts::with_contexts(&["window-1"]));
        contexts.answer(ITEM_COUNT, json!(4));
        let (backup, db) = coordinator(contexts.clone()).await;

        assert_eq!(backup.retry_pending("sync-scans").await.unwrap(), None);
        assert!(contexts.posted().is_empty());

        db.kv_set(PENDING_BACKUP, &json!(true)).await.unwrap();
        let outcome = backup.retry_pending("sync-scans").await.unwrap();
        assert_eq!(outcome, Some(BackupOutcome::Delegated { contexts: 1, item_count: 4 }));
        assert!(!backup.is_pending().await.unwrap());
    }
}
