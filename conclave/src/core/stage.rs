//! Stage record: one pipeline step within a run.

use super::{ExecutorId, RunId, StageRole, StageStatus};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token and latency metadata from one executor invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Tokens consumed by the request.
    pub tokens_in: u32,
    /// Tokens produced in the reply.
    pub tokens_out: u32,
    /// Wall-clock latency of the call in milliseconds.
    pub latency_ms: u64,
}

impl StageMetrics {
    /// Returns total tokens across request and reply.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.tokens_in + self.tokens_out
    }
}

/// One pipeline step within a run.
///
/// Created when the driver reaches the step; mutated only by that step's own
/// execution attempt and never by a later stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage id.
    pub id: Uuid,
    /// Back-reference to the owning run (not ownership).
    pub run_id: RunId,
    /// The role this stage is bound to.
    pub role: StageRole,
    /// The executor the router assigned, once known.
    pub executor: Option<ExecutorId>,
    /// Execution status.
    pub status: StageStatus,
    /// Snapshot of the context this stage consumed.
    pub input_snapshot: String,
    /// Output text, once the stage is done.
    pub output: Option<String>,
    /// Error description for failed stages.
    pub error: Option<String>,
    /// Reason for a skipped stage.
    pub skip_reason: Option<String>,
    /// Invocation metrics.
    pub metrics: StageMetrics,
    /// Fan-out batch this stage belongs to, if any.
    pub batch_id: Option<Uuid>,
    /// When execution began.
    pub started_at: Option<Timestamp>,
    /// When execution settled.
    pub finished_at: Option<Timestamp>,
}

impl StageRecord {
    /// Creates a pending record for a role within a run.
    #[must_use]
    pub fn pending(run_id: RunId, role: StageRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            role,
            executor: None,
            status: StageStatus::Pending,
            input_snapshot: String::new(),
            output: None,
            error: None,
            skip_reason: None,
            metrics: StageMetrics::default(),
            batch_id: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Tags the record as a member of a fan-out batch.
    #[must_use]
    pub fn in_batch(mut self, batch_id: Uuid) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Marks the stage running with its assigned executor and the context
    /// it consumes.
    pub fn begin(&mut self, executor: ExecutorId, input_snapshot: impl Into<String>) {
        self.executor = Some(executor);
        self.input_snapshot = input_snapshot.into();
        self.status = StageStatus::Running;
        self.started_at = Some(now_utc());
    }

    /// Settles the stage as done with its output and metrics.
    pub fn complete(&mut self, output: impl Into<String>, metrics: StageMetrics) {
        self.output = Some(output.into());
        self.metrics = metrics;
        self.status = StageStatus::Done;
        self.finished_at = Some(now_utc());
    }

    /// Settles the stage as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.status = StageStatus::Error;
        self.finished_at = Some(now_utc());
    }

    /// Settles the stage as skipped without ever running it.
    pub fn skip(&mut self, reason: impl Into<String>) {
        self.skip_reason = Some(reason.into());
        self.status = StageStatus::Skipped;
        self.finished_at = Some(now_utc());
    }
}
