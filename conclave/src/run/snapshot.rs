//! Immutable point-in-time view of a run.

use super::{Run, RunTotals};
use crate::core::{ConfidenceLevel, RunId, RunStatus, StageRole};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};

/// A read-only view of a run, safe to hand to pollers and one-shot queries.
///
/// Snapshots of an unchanged run are byte-identical once serialized, which
/// makes polling idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Run id.
    pub id: RunId,
    /// Lifecycle status at the instant of observation.
    pub status: RunStatus,
    /// The role currently executing, while the run is live.
    pub current_stage: Option<StageRole>,
    /// The final stage's output, once terminal.
    pub output: Option<String>,
    /// Failure description for runs that ended in error.
    pub error: Option<String>,
    /// Final confidence, when reviews were collected.
    pub confidence: Option<ConfidenceLevel>,
    /// Aggregate call totals.
    pub totals: RunTotals,
    /// When the run was created.
    pub created_at: Timestamp,
    /// When the driver started it.
    pub started_at: Option<Timestamp>,
    /// When it reached a terminal status.
    pub finished_at: Option<Timestamp>,
}

impl From<&Run> for RunSnapshot {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            status: run.status,
            current_stage: run.current_stage,
            output: run.output.clone(),
            error: run.error.clone(),
            confidence: run.confidence,
            totals: run.totals,
            created_at: run.created_at,
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }
}
