//! cleanup_cache tool implementation.
//!
//! Evicts entries older than a maximum age from the current generation.

use std::time::Duration;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;
use crate::worker::Worker;

/// Parameters for the cleanup_cache tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CleanupCacheParams {
    /// Maximum entry age in seconds. Defaults to the configured max age.
    pub max_age_secs: Option<u64>,
}

/// Output from the cleanup_cache tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CleanupCacheOutput {
    /// Number of entries removed.
    pub removed: usize,
}

pub async fn cleanup_impl(worker: &Worker, params: CleanupCacheParams) -> Result<CallToolResult, McpError> {
    let removed = worker.evict(params.max_age_secs.map(Duration::from_secs)).await?;
    json_result(&CleanupCacheOutput { removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::text_of;
    use crate::worker::testing::{FakeContexts, active_harness, app_url};
    use chrono::{Duration as ChronoDuration, Utc};
    use harbor_core::{Request, Response, Snapshot};
    use url::Url;

    #[tokio::test]
    async fn test_cleanup_removes_stale_entry() {
        let h = active_harness(FakeContexts::new()).await;
        let request = Request::get(Url::parse(&app_url("/old.js")).unwrap());
        let mut stale = Snapshot::capture(&request, &Response::new(200, "old"));
        stale.captured_at = Some((Utc::now() - ChronoDuration::days(30)).to_rfc3339());
        h.db.put_entry("qr-scanner-v3", &stale).await.unwrap();

        let result = cleanup_impl(&h.worker, CleanupCacheParams::default()).await.unwrap();
        let output: CleanupCacheOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.removed, 1);
        assert_eq!(h.db.entry_keys("qr-scanner-v3").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cleanup_rejects_zero_age() {
        let h = active_harness(FakeContexts::new()).await;
        let params = CleanupCacheParams { max_age_secs: Some(0) };
        let err = cleanup_impl(&h.worker, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert_eq!(h.db.entry_keys("qr-scanner-v3").await.unwrap().len(), 3);
    }
}
