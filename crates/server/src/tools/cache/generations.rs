//! generations tool implementation.
//!
//! Lists store generations with their entry counts.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;
use crate::worker::Worker;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub entries: usize,
    /// Whether this is the generation the worker serves from.
    pub current: bool,
}

/// Output from the generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationsOutput {
    pub generations: Vec<GenerationInfo>,
}

pub async fn generations_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let mut generations = Vec::new();
    for name in worker.generations().await? {
        let entries = worker.entry_count(&name).await?;
        let current = name == worker.generation();
        generations.push(GenerationInfo { name, entries, current });
    }
    json_result(&GenerationsOutput { generations })
}
