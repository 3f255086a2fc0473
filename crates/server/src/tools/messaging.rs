//! sync and post_message tools.
//!
//! `sync` fires a background trigger by tag; `post_message` delivers a
//! message as if it came from a foreground context and returns the reply.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json_result;
use crate::error::ToolError;
use crate::worker::Worker;
use crate::worker::delegation::{Envelope, Message};
use crate::worker::dispatch::SyncOutcome;

/// Parameters for the sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncParams {
    /// Trigger tag, e.g. "sync-scans" or "auto-backup".
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncOutput {
    pub tag: String,
    pub outcome: SyncOutcome,
}

/// Parameters for the post_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostMessageParams {
    /// Tagged message, e.g. `{"type": "connectivity-check"}`.
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostMessageOutput {
    pub reply: Value,
}

pub async fn sync_impl(worker: &Worker, params: SyncParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.trim();
    if tag.is_empty() {
        return Err(ToolError::InvalidInput("tag cannot be empty".into()).into());
    }

    let outcome = worker.handle_sync(tag).await?;
    json_result(&SyncOutput { tag: tag.to_string(), outcome })
}

pub async fn post_message_impl(worker: &Worker, params: PostMessageParams) -> Result<CallToolResult, McpError> {
    let (envelope, reply) = Envelope::request(params.message);
    worker.handle_envelope(envelope).await;
    let reply = reply.await.unwrap_or(Value::Null);
    json_result(&PostMessageOutput { reply })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::text_of;
    use crate::worker::backup::BackupOutcome;
    use crate::worker::testing::{FakeContexts, harness, seeded_network};
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_auto_backup_disabled() {
        let h = harness(seeded_network(), FakeContexts::with_contexts(&["window-1"])).await;
        h.db.kv_set("auto-backup-enabled", &json!(false)).await.unwrap();

        let result = sync_impl(&h.worker, SyncParams { tag: "auto-backup".into() }).await.unwrap();
        let output: SyncOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.outcome, SyncOutcome::Backup(BackupOutcome::Disabled));
        assert!(h.contexts.posted().is_empty());
    }

    #[tokio::test]
    async fn test_sync_unknown_tag() {
        let h = harness(seeded_network(), FakeContexts::new()).await;
        let result = sync_impl(&h.worker, SyncParams { tag: "mystery".into() }).await.unwrap();
        let output: SyncOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.outcome, SyncOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_sync_empty_tag_rejected() {
        let h = harness(seeded_network(), FakeContexts::new()).await;
        assert!(sync_impl(&h.worker, SyncParams { tag: " ".into() }).await.is_err());
    }

    #[tokio::test]
    async fn test_post_message_from_json() {
        let h = harness(seeded_network(), FakeContexts::new()).await;
        let params: PostMessageParams =
            serde_json::from_value(json!({"message": {"type": "set-storage-value", "key": "item-count", "value": 3}}))
                .unwrap();

        let result = post_message_impl(&h.worker, params).await.unwrap();
        let output: PostMessageOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.reply, json!({"ok": true}));
        assert_eq!(h.db.kv_get("item-count").await.unwrap(), Some(json!(3)));
    }
}
