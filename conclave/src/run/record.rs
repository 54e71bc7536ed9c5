//! The run entity: one end-to-end orchestration invocation.

use crate::core::{ConfidenceLevel, RunId, StageMetrics, RunStatus, StageRole};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// Aggregate token and latency totals across every executor call in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    /// Total tokens consumed by requests.
    pub tokens_in: u32,
    /// Total tokens produced in replies.
    pub tokens_out: u32,
    /// Summed call latency in milliseconds.
    pub latency_ms: u64,
}

impl RunTotals {
    /// Folds one stage's metrics into the totals.
    pub fn absorb(&mut self, metrics: &StageMetrics) {
        self.tokens_in += metrics.tokens_in;
        self.tokens_out += metrics.tokens_out;
        self.latency_ms += metrics.latency_ms;
    }

    /// Returns total tokens across requests and replies.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.tokens_in + self.tokens_out
    }
}

/// One end-to-end invocation of the orchestration pipeline.
///
/// Owned exclusively by the run registry; mutated only through
/// [`RunRegistry::advance`](super::RunRegistry::advance) and the cancellation
/// path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run id.
    pub id: RunId,
    /// The original client input.
    pub input: String,
    /// Lifecycle status.
    pub status: RunStatus,
    /// The role currently executing, while the run is live.
    pub current_stage: Option<StageRole>,
    /// When the run was created.
    pub created_at: Timestamp,
    /// When the driver started it.
    pub started_at: Option<Timestamp>,
    /// When it reached a terminal status.
    pub finished_at: Option<Timestamp>,
    /// Aggregate call totals.
    pub totals: RunTotals,
    /// Final confidence, when reviews were collected.
    pub confidence: Option<ConfidenceLevel>,
    /// The final stage's output.
    pub output: Option<String>,
    /// Failure description for runs that ended in error.
    pub error: Option<String>,
}

impl Run {
    /// Creates a pending run for an input.
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            input: input.into(),
            status: RunStatus::Pending,
            current_stage: None,
            created_at: now_utc(),
            started_at: None,
            finished_at: None,
            totals: RunTotals::default(),
            confidence: None,
            output: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_is_pending() {
        let run = Run::new("Summarize X");
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.input, "Summarize X");
        assert!(run.started_at.is_none());
        assert!(run.output.is_none());
    }

    #[test]
    fn test_totals_absorb() {
        let mut totals = RunTotals::default();
        totals.absorb(&StageMetrics {
            tokens_in: 100,
            tokens_out: 40,
            latency_ms: 300,
        });
        totals.absorb(&StageMetrics {
            tokens_in: 50,
            tokens_out: 10,
            latency_ms: 200,
        });

        assert_eq!(totals.tokens_in, 150);
        assert_eq!(totals.tokens_out, 50);
        assert_eq!(totals.latency_ms, 500);
        assert_eq!(totals.total_tokens(), 200);
    }
}
