//! Stored response snapshots.
//!
//! A snapshot is immutable once written: a later write for the same
//! (generation, key) replaces the row wholesale.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use crate::Error;
use crate::request::{Request, Response, ResponseType};

/// A stored response, keyed by request identity within one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Snapshot {
    pub key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers_json: String,
    pub body: Vec<u8>,
    /// RFC 3339 capture time. `None` when no usable time was recorded.
    pub captured_at: Option<String>,
    pub stored_at: String,
}

impl Snapshot {
    /// Capture a response for later replay.
    ///
    /// The capture time comes from the response `Date` header when it parses,
    /// otherwise it is the time of capture.
    pub fn capture(request: &Request, response: &Response) -> Self {
        let now = Utc::now();
        let captured_at = response
            .header("date")
            .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(now);

        Self {
            key: request.cache_key(),
            method: request.method().to_string(),
            url: request.url().to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            response_type: response.response_type,
            headers_json: serde_json::to_string(&response.headers).unwrap_or_else(|_| "{}".to_string()),
            body: response.body.to_vec(),
            captured_at: Some(captured_at.to_rfc3339()),
            stored_at: now.to_rfc3339(),
        }
    }

    /// Rebuild the response exactly as it was stored.
    pub fn to_response(&self) -> Response {
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers_json).unwrap_or_default();
        Response {
            status: self.status,
            status_text: self.status_text.clone(),
            response_type: self.response_type,
            headers,
            body: self.body.clone().into(),
        }
    }

    /// Parsed capture time, if present and well-formed.
    pub fn captured_time(&self) -> Option<DateTime<Utc>> {
        self.captured_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
    }
}

impl CacheDb {
    /// Write a snapshot into a generation, creating the generation if absent.
    pub async fn put_entry(&self, generation: &str, snapshot: &Snapshot) -> Result<(), Error> {
        let generation = generation.to_string();
        let snapshot = snapshot.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![&generation, Utc::now().to_rfc3339()],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                    generation, key, method, url, status, status_text,
                    response_type, headers_json, body, captured_at, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(generation, key) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    status_text = excluded.status_text,
                    response_type = excluded.response_type,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    captured_at = excluded.captured_at,
                    stored_at = excluded.stored_at",
                    params![
                        &generation,
                        &snapshot.key,
                        &snapshot.method,
                        &snapshot.url,
                        snapshot.status,
                        &snapshot.status_text,
                        snapshot.response_type.as_str(),
                        &snapshot.headers_json,
                        &snapshot.body,
                        &snapshot.captured_at,
                        &snapshot.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a snapshot by key from a generation.
    ///
    /// Returns None if the generation or key doesn't exist.
    pub async fn get_entry(&self, generation: &str, key: &str) -> Result<Option<Snapshot>, Error> {
        let generation = generation.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Snapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status, status_text, response_type,
                        headers_json, body, captured_at, stored_at
                FROM entries WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    let response_type: String = row.get(5)?;
                    Ok(Snapshot {
                        key: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        status: row.get(3)?,
                        status_text: row.get(4)?,
                        response_type: ResponseType::parse(&response_type).unwrap_or(ResponseType::Basic),
                        headers_json: row.get(6)?,
                        body: row.get(7)?,
                        captured_at: row.get(8)?,
                        stored_at: row.get(9)?,
                    })
                });

                match result {
                    Ok(s) => Ok(Some(s)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// List every key stored in a generation, in insertion-independent order.
    pub async fn entry_keys(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE generation = ?1 ORDER BY key")?;
                let keys = stmt
                    .query_map(params![generation], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry. Returns whether a row was removed.
    pub async fn delete_entry(&self, generation: &str, key: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count =
                    conn.execute("DELETE FROM entries WHERE generation = ?1 AND key = ?2", params![generation, key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
