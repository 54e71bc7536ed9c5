//! Bounded-retry wrapper for audit writes.

use super::AuditRecorder;
use crate::config::RetryConfig;
use crate::core::{RunId, StageRecord};
use crate::errors::AuditError;
use crate::judge::Verdict;
use crate::review::ReviewSignal;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Retries failing audit writes with exponential backoff and full jitter.
///
/// Exhausted retries surface as [`AuditError::Exhausted`]; the driver then
/// marks the run degraded instead of discarding the computed output. Reads
/// pass through unretried.
pub struct RetryingRecorder {
    inner: Arc<dyn AuditRecorder>,
    policy: RetryConfig,
}

impl RetryingRecorder {
    /// Wraps a recorder with a retry policy.
    #[must_use]
    pub fn new(inner: Arc<dyn AuditRecorder>, policy: RetryConfig) -> Self {
        Self { inner, policy }
    }

    async fn with_retries<F, Fut>(&self, what: &str, mut attempt_fn: F) -> Result<(), AuditError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), AuditError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            match attempt_fn().await {
                Ok(()) => return Ok(()),
                // Contract violations are not transient; retrying them
                // cannot help.
                Err(err @ AuditError::Rejected(_)) => return Err(err),
                Err(err) => {
                    warn!(
                        write = what,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "audit write failed"
                    );
                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(AuditError::Exhausted {
            attempts: max_attempts,
        })
    }
}

#[async_trait]
impl AuditRecorder for RetryingRecorder {
    async fn append_stage(&self, record: StageRecord) -> Result<(), AuditError> {
        self.with_retries("stage", || self.inner.append_stage(record.clone()))
            .await
    }

    async fn append_review(&self, signal: ReviewSignal) -> Result<(), AuditError> {
        self.with_retries("review", || self.inner.append_review(signal.clone()))
            .await
    }

    async fn append_verdict(&self, run_id: RunId, verdict: Verdict) -> Result<(), AuditError> {
        self.with_retries("verdict", || {
            self.inner.append_verdict(run_id, verdict.clone())
        })
        .await
    }

    async fn stages(&self, run_id: RunId) -> Result<Vec<StageRecord>, AuditError> {
        self.inner.stages(run_id).await
    }

    async fn reviews(&self, run_id: RunId) -> Result<Vec<ReviewSignal>, AuditError> {
        self.inner.reviews(run_id).await
    }

    async fn verdict(&self, run_id: RunId) -> Result<Option<Verdict>, AuditError> {
        self.inner.verdict(run_id).await
    }
}
