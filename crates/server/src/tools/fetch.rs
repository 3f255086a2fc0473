//! fetch tool implementation.
//!
//! Offers one request to the worker exactly as an intercepted page request
//! would arrive, and reports which strategy answered it.

use std::collections::BTreeMap;

use harbor_client::{Classification, canonicalize};
use harbor_core::{Destination, Request, RequestMode};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;
use crate::worker::strategy::Source;
use crate::worker::{FetchOutcome, Worker};

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path relative to the application origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "same-origin", "no-cors" (default) or "cors".
    #[serde(default)]
    pub mode: RequestMode,

    /// Request destination, e.g. "image", "script", "style".
    #[serde(default)]
    pub destination: Destination,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, forwarded as-is when the request reaches the network.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutput {
    /// Canonical request URL.
    pub url: String,
    /// False when the worker declined and the host should go to the network.
    pub intercepted: bool,
    pub classification: Option<Classification>,
    pub source: Option<Source>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub response_type: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: Option<String>,
}

pub async fn fetch_impl(worker: &Worker, params: FetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() || !params.method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ToolError::InvalidInput(format!("invalid method: {:?}", params.method)).into());
    }

    let base = worker.config().origin_url().map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let url = canonicalize(&params.url, &base).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

    let mut request = Request::new(&params.method, url)
        .with_mode(params.mode)
        .with_destination(params.destination);
    for (name, value) in &params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let output = match worker.handle_fetch(&request).await {
        FetchOutcome::PassThrough => FetchOutput {
            url: request.url().to_string(),
            intercepted: false,
            classification: None,
            source: None,
            status: None,
            status_text: None,
            response_type: None,
            headers: BTreeMap::new(),
            body: None,
        },
        FetchOutcome::Respond(served) => FetchOutput {
            url: request.url().to_string(),
            intercepted: true,
            classification: Some(served.classification),
            source: Some(served.source),
            status: Some(served.response.status),
            status_text: Some(served.response.status_text.clone()),
            response_type: Some(served.response.response_type.as_str().to_string()),
            body: Some(String::from_utf8_lossy(&served.response.body).to_string()),
            headers: served.response.headers,
        },
    };

    json_result(&output)
}
