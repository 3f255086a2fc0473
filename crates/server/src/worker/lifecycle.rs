//! Install and activate transitions.

use std::sync::Arc;

use harbor_core::Error;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use super::delegation::Contexts;
use super::store_manager::{PopulateReport, StoreManager};

/// Lifecycle phase of this worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Parsed,
    Installing,
    WaitingToActivate,
    Active,
    /// Install failed; this generation will never serve requests.
    Redundant,
}

pub struct LifecycleController {
    manager: Arc<StoreManager>,
    contexts: Arc<dyn Contexts>,
    precache: Vec<String>,
    phase: RwLock<Phase>,
    transition: Mutex<()>,
}

impl LifecycleController {
    pub fn new(manager: Arc<StoreManager>, contexts: Arc<dyn Contexts>, precache: Vec<String>) -> Self {
        Self { manager, contexts, precache, phase: RwLock::new(Phase::Parsed), transition: Mutex::new(()) }
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    async fn set_phase(&self, phase: Phase) {
        let mut current = self.phase.write().await;
        tracing::debug!(from = ?*current, to = ?phase, "lifecycle transition");
        *current = phase;
    }

    /// Populate the current generation and request immediate takeover.
    ///
    /// Re-running after a successful install refreshes the generation in
    /// place. If that re-run fails, the earlier phase is kept since the
    /// generation it populated is still intact.
    pub async fn install(&self) -> Result<PopulateReport, Error> {
        let _guard = self.transition.lock().await;
        let previous = self.phase().await;
        if previous == Phase::Redundant {
            return Err(Error::InvalidState("worker is redundant".into()));
        }
        if previous != Phase::Active {
            self.set_phase(Phase::Installing).await;
        }

        let report = match self.manager.populate(&self.precache).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(generation = %self.manager.current(), error = %e, "install failed");
                let next = match previous {
                    Phase::WaitingToActivate | Phase::Active => previous,
                    _ => Phase::Redundant,
                };
                self.set_phase(next).await;
                return Err(e);
            }
        };

        if let Err(e) = self.contexts.skip_waiting().await {
            tracing::warn!(error = %e, "skip-waiting request failed");
        }
        if previous != Phase::Active {
            self.set_phase(Phase::WaitingToActivate).await;
        }
        tracing::info!(generation = %self.manager.current(), stored = report.stored, "install complete");
        Ok(report)
    }

    /// Delete stale generations, then claim every open context.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let _guard = self.transition.lock().await;
        match self.phase().await {
            Phase::WaitingToActivate | Phase::Active => {}
            other => return Err(Error::InvalidState(format!("cannot activate from {other:?}"))),
        }

        let deleted = self.manager.activate(self.manager.current()).await?;
        if let Err(e) = self.contexts.claim().await {
            tracing::warn!(error = %e, "claiming contexts failed");
        }
        self.set_phase(Phase::Active).await;
        tracing::info!(generation = %self.manager.current(), deleted = deleted.len(), "activated");
        Ok(deleted)
    }
}
