//! In-memory audit recorder.

use super::AuditRecorder;
use crate::core::{RunId, StageRecord};
use crate::errors::AuditError;
use crate::judge::Verdict;
use crate::review::ReviewSignal;
use async_trait::async_trait;
use dashmap::DashMap;

/// Keeps the audit trail in process memory.
///
/// The default recorder for tests and single-process deployments; durable
/// stores implement the same contract.
#[derive(Debug, Default)]
pub struct InMemoryAuditRecorder {
    stages: DashMap<RunId, Vec<StageRecord>>,
    reviews: DashMap<RunId, Vec<ReviewSignal>>,
    verdicts: DashMap<RunId, Verdict>,
}

impl InMemoryAuditRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRecorder for InMemoryAuditRecorder {
    async fn append_stage(&self, record: StageRecord) -> Result<(), AuditError> {
        self.stages.entry(record.run_id).or_default().push(record);
        Ok(())
    }

    async fn append_review(&self, signal: ReviewSignal) -> Result<(), AuditError> {
        self.reviews.entry(signal.run_id).or_default().push(signal);
        Ok(())
    }

    async fn append_verdict(&self, run_id: RunId, verdict: Verdict) -> Result<(), AuditError> {
        if self.verdicts.contains_key(&run_id) {
            return Err(AuditError::Rejected(format!(
                "verdict already recorded for run {run_id}"
            )));
        }
        self.verdicts.insert(run_id, verdict);
        Ok(())
    }

    async fn stages(&self, run_id: RunId) -> Result<Vec<StageRecord>, AuditError> {
        Ok(self
            .stages
            .get(&run_id)
            .map(|records| records.clone())
            .unwrap_or_default())
    }

    async fn reviews(&self, run_id: RunId) -> Result<Vec<ReviewSignal>, AuditError> {
        Ok(self
            .reviews
            .get(&run_id)
            .map(|signals| signals.clone())
            .unwrap_or_default())
    }

    async fn verdict(&self, run_id: RunId) -> Result<Option<Verdict>, AuditError> {
        Ok(self.verdicts.get(&run_id).map(|verdict| verdict.clone()))
    }
}
