//! Durable key-value store scoped to the worker.
//!
//! Values are JSON documents. This table is never touched by generation
//! cutover, so state recorded here survives application upgrades.

use chrono::Utc;
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use crate::Error;

/// Whether background auto-backup is enabled. Absent means enabled.
pub const AUTO_BACKUP_ENABLED: &str = "auto-backup-enabled";
/// Item count included in the last delivered backup.
pub const LAST_BACKUP_COUNT: &str = "last-backup-count";
/// RFC 3339 time of the last delivered backup.
pub const LAST_BACKUP_TIME: &str = "last-backup-time";
/// Set when a backup was owed but no foreground context could take it.
pub const PENDING_BACKUP: &str = "pending-backup";
/// Latest item count mirrored from a foreground context.
pub const ITEM_COUNT: &str = "item-count";

impl CacheDb {
    pub async fn kv_get(&self, key: &str) -> Result<Option<Value>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Value>, Error> {
                let result =
                    conn.query_row("SELECT value_json FROM kv WHERE key = ?1", params![key], |row| row.get::<_, String>(0));

                match result {
                    Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    pub async fn kv_set(&self, key: &str, value: &Value) -> Result<(), Error> {
        let key = key.to_string();
        let json = serde_json::to_string(value)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv (key, value_json, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value_json = excluded.value_json,
                        updated_at = excluded.updated_at",
                    params![key, json, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn kv_delete(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
