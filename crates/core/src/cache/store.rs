//! Storage traits the worker is written against.
//!
//! The worker only ever sees these seams, so tests can swap in stores that
//! fail on demand and hosts can back them with something other than SQLite.

use serde_json::Value;

use super::connection::CacheDb;
use super::snapshots::Snapshot;
use crate::Error;

/// Named generations of request/response snapshots.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Create the generation if absent.
    async fn open(&self, generation: &str) -> Result<(), Error>;

    /// Every existing generation name.
    async fn generations(&self) -> Result<Vec<String>, Error>;

    /// Remove a generation with all its entries. Returns whether it existed.
    async fn delete_generation(&self, generation: &str) -> Result<bool, Error>;

    /// Store a snapshot, replacing any previous one under the same key.
    async fn put(&self, generation: &str, snapshot: &Snapshot) -> Result<(), Error>;

    async fn get(&self, generation: &str, key: &str) -> Result<Option<Snapshot>, Error>;

    /// Snapshot of the key list at the time of the call.
    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error>;

    async fn delete(&self, generation: &str, key: &str) -> Result<bool, Error>;
}

/// Worker-local durable key-value store holding JSON values.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, Error>;

    async fn set(&self, key: &str, value: Value) -> Result<(), Error>;

    async fn remove(&self, key: &str) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl ResourceStore for CacheDb {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.open_generation(generation).await.map(|_| ())
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.generation_names().await
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, Error> {
        CacheDb::delete_generation(self, generation).await
    }

    async fn put(&self, generation: &str, snapshot: &Snapshot) -> Result<(), Error> {
        self.put_entry(generation, snapshot).await
    }

    async fn get(&self, generation: &str, key: &str) -> Result<Option<Snapshot>, Error> {
        self.get_entry(generation, key).await
    }

    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error> {
        self.entry_keys(generation).await
    }

    async fn delete(&self, generation: &str, key: &str) -> Result<bool, Error> {
        self.delete_entry(generation, key).await
    }
}

#[async_trait::async_trait]
impl KeyValueStore for CacheDb {
    async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        self.kv_get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), Error> {
        self.kv_set(key, &value).await
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.kv_delete(key).await.map(|_| ())
    }
}
