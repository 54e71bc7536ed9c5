//! Append-oriented audit trail.
//!
//! The recorder is an external persistence collaborator; only its abstract
//! write/read contract lives here. The driver awaits every append before
//! advancing to the next stage (write-before-advance), so the audit trail
//! never lags behind observable progress.

mod memory;
mod retry;

pub use memory::InMemoryAuditRecorder;
pub use retry::RetryingRecorder;

use crate::core::{RunId, StageRecord};
use crate::errors::AuditError;
use crate::judge::Verdict;
use crate::review::ReviewSignal;
use async_trait::async_trait;

/// Durable, append-oriented record of a run's stage transitions, review
/// signals and verdict.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    /// Appends one stage record.
    async fn append_stage(&self, record: StageRecord) -> Result<(), AuditError>;

    /// Appends one review signal.
    async fn append_review(&self, signal: ReviewSignal) -> Result<(), AuditError>;

    /// Appends the run's verdict. At most one verdict per run is accepted.
    async fn append_verdict(&self, run_id: RunId, verdict: Verdict) -> Result<(), AuditError>;

    /// Reads the stage records of a run, in append order.
    async fn stages(&self, run_id: RunId) -> Result<Vec<StageRecord>, AuditError>;

    /// Reads the review signals of a run, in append order.
    async fn reviews(&self, run_id: RunId) -> Result<Vec<ReviewSignal>, AuditError>;

    /// Reads the run's verdict, if one was recorded.
    async fn verdict(&self, run_id: RunId) -> Result<Option<Verdict>, AuditError>;
}
