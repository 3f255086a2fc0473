//! Staleness eviction for the current generation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use harbor_core::{Error, ResourceStore};

pub struct Evictor {
    store: Arc<dyn ResourceStore>,
    generation: String,
}

impl Evictor {
    pub fn new(store: Arc<dyn ResourceStore>, generation: String) -> Self {
        Self { store, generation }
    }

    /// Remove entries captured more than `max_age` ago.
    ///
    /// Walks a snapshot of the key set, so entries written concurrently are
    /// left for the next run. Entries with no usable capture time are kept.
    pub async fn evict(&self, max_age: Duration) -> Result<usize, Error> {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return Ok(0);
        };
        let now = Utc::now();
        let keys = self.store.keys(&self.generation).await?;
        let mut removed = 0;

        for key in keys {
            let snapshot = match self.store.get(&self.generation, &key).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "eviction read failed, entry kept");
                    continue;
                }
            };
            let Some(captured) = snapshot.captured_time() else { continue };
            if now.signed_duration_since(captured) <= max_age {
                continue;
            }
            match self.store.delete(&self.generation, &key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "eviction delete failed"),
            }
        }

        tracing::info!(generation = %self.generation, removed, "stale entries evicted");
        Ok(removed)
    }
}
