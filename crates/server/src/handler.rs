//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker entry points.
use std::sync::Arc;

use crate::tools::cache::{CleanupCacheParams, cleanup_impl, generations_impl};
use crate::tools::fetch::{FetchParams, fetch_impl};
use crate::tools::lifecycle::{activate_impl, install_impl, status_impl};
use crate::tools::messaging::{PostMessageParams, SyncParams, post_message_impl, sync_impl};
use crate::worker::Worker;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The MCP server handler for harbor-worker.
#[derive(Clone)]
pub struct HarborServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<Worker>,
}

#[tool_router]
impl HarborServer {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { tool_router: Self::tool_router(), worker }
    }

    #[tool(description = "Install the current store generation: fetch every precache resource and store it. Fails if the offline page cannot be fetched.")]
    async fn install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Activate the installed generation: delete stale generations owned by this app and start serving requests.")]
    async fn activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    /// Offer a request to the worker as if a page issued it.
    #[tool(
        description = "Offer a request to the worker. Returns the response chosen by the strategy for its class (navigation, static asset, other), or intercepted=false."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Remove entries older than max_age_secs (default: configured max age) from the current generation.")]
    async fn cleanup_cache(&self, params: Parameters<CleanupCacheParams>) -> Result<CallToolResult, McpError> {
        cleanup_impl(&self.worker, params.0).await
    }

    #[tool(description = "Fire a background trigger by tag: sync-scans or auto-backup. Unknown tags are ignored.")]
    async fn sync(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.worker, params.0).await
    }

    #[tool(
        description = "Deliver a message as a foreground context would: get-storage-value, set-storage-value, connectivity-check, cleanup-cache."
    )]
    async fn post_message(&self, params: Parameters<PostMessageParams>) -> Result<CallToolResult, McpError> {
        post_message_impl(&self.worker, params.0).await
    }

    #[tool(description = "List store generations with entry counts.")]
    async fn generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.worker).await
    }

    #[tool(description = "Report lifecycle phase, current generation and origin.")]
    async fn status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }
}

impl ServerHandler for HarborServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "harbor-worker".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{FakeContexts, harness, seeded_network};

    #[tokio::test]
    async fn test_router_lists_every_tool() {
        let h = harness(seeded_network(), FakeContexts::new()).await;
        let server = HarborServer::new(Arc::new(h.worker));

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["activate", "cleanup_cache", "fetch", "generations", "install", "post_message", "status", "sync"]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let h = harness(seeded_network(), FakeContexts::new()).await;
        let server = HarborServer::new(Arc::new(h.worker));
        assert_eq!(server.get_info().server_info.name, "harbor-worker");
    }
}
