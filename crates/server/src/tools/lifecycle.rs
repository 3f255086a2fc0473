//! install, activate and status tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::worker::Worker;
use crate::worker::lifecycle::Phase;

/// Output from the install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallOutput {
    /// Generation that was populated.
    pub generation: String,
    /// Entries written.
    pub stored: usize,
    /// Optional resources that could not be fetched.
    pub skipped: Vec<String>,
    pub phase: Phase,
}

/// Output from the activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivateOutput {
    pub generation: String,
    /// Stale generations removed during activation.
    pub deleted: Vec<String>,
    pub phase: Phase,
}

/// Output from the status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusOutput {
    pub phase: Phase,
    /// Current generation name.
    pub generation: String,
    /// Every generation present in the store.
    pub generations: Vec<String>,
    pub origin: String,
}

pub async fn install_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let report = worker.install().await?;
    let output = InstallOutput {
        generation: worker.generation().to_string(),
        stored: report.stored,
        skipped: report.skipped,
        phase: worker.phase().await,
    };
    json_result(&output)
}

pub async fn activate_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let deleted = worker.activate().await?;
    let output = ActivateOutput { generation: worker.generation().to_string(), deleted, phase: worker.phase().await };
    json_result(&output)
}

pub async fn status_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let output = StatusOutput {
        phase: worker.phase().await,
        generation: worker.generation().to_string(),
        generations: worker.generations().await?,
        origin: worker.config().origin.clone(),
    };
    json_result(&output)
}
