//! Parallel collection of third-party review signals.

use super::ReviewSignal;
use crate::core::{RunId, StageRole};
use crate::executor::{Executor, InvokeBudget};
use futures::future;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Fans a work-in-progress summary out to independent reviewers.
///
/// Each reviewer gets a bounded per-call timeout, and the whole collection
/// runs inside a window. Reviewers that do not respond in time are recorded
/// as absent - never as disagreement. The collector runs concurrently with
/// the main stage chain and never stalls its advancement.
#[derive(Debug)]
pub struct SignalCollector {
    reviewers: Vec<Arc<dyn Executor>>,
    reviewer_timeout: Duration,
    window: Duration,
}

impl SignalCollector {
    /// Creates a collector over an enabled reviewer set.
    #[must_use]
    pub fn new(reviewers: Vec<Arc<dyn Executor>>) -> Self {
        Self {
            reviewers,
            reviewer_timeout: Duration::from_secs(10),
            window: Duration::from_secs(30),
        }
    }

    /// Sets the per-reviewer timeout.
    #[must_use]
    pub fn with_reviewer_timeout(mut self, timeout: Duration) -> Self {
        self.reviewer_timeout = timeout;
        self
    }

    /// Sets the total collection window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Returns the number of enabled reviewers.
    #[must_use]
    pub fn reviewer_count(&self) -> usize {
        self.reviewers.len()
    }

    /// Collects signals for a run.
    ///
    /// Resolves when every reviewer has responded or the window closes,
    /// whichever is first. Signals that arrived before the window closed are
    /// kept even when later reviewers are cut off.
    pub async fn collect(&self, run_id: RunId, summary: String) -> Vec<ReviewSignal> {
        if self.reviewers.is_empty() {
            return Vec::new();
        }

        let signals = Arc::new(Mutex::new(Vec::new()));

        let calls = self.reviewers.iter().cloned().map(|reviewer| {
            let signals = signals.clone();
            let summary = summary.clone();
            let timeout = self.reviewer_timeout;

            async move {
                let id = reviewer.id().clone();
                let started = Instant::now();
                let outcome = tokio::time::timeout(
                    timeout,
                    reviewer.invoke(StageRole::Reviewer, &summary, &InvokeBudget::unlimited()),
                )
                .await;

                let latency_ms = started.elapsed().as_millis() as u64;
                match outcome {
                    Ok(Ok(reply)) => {
                        signals
                            .lock()
                            .push(ReviewSignal::from_reply(run_id, id, reply.text, latency_ms));
                    }
                    Ok(Err(failure)) => {
                        warn!(reviewer = %id, error = %failure, "reviewer call failed");
                    }
                    Err(_) => {
                        debug!(reviewer = %id, "reviewer timed out; recorded as absent");
                    }
                }
            }
        });

        if tokio::time::timeout(self.window, future::join_all(calls))
            .await
            .is_err()
        {
            warn!(
                run_id = %run_id,
                collected = signals.lock().len(),
                "review window closed with reviewers outstanding"
            );
        }

        let collected = std::mem::take(&mut *signals.lock());
        collected
    }
}
