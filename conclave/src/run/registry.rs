//! The run registry: owner of every run's lifecycle state.

use super::{CancelFlag, Run, RunSnapshot};
use crate::core::{ConfidenceLevel, RunId, RunStatus, StageMetrics, StageRole};
use crate::errors::{ConclaveError, ValidationError};
use crate::utils::{now_utc, validate_run_input};
use dashmap::DashMap;
use std::sync::Arc;

struct RunEntry {
    run: Run,
    cancel: Arc<CancelFlag>,
}

/// A single mutation applied to a run by the driver.
///
/// Updates compose through builder methods; unset fields leave the run
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct RunUpdate {
    status: Option<RunStatus>,
    current_stage: Option<StageRole>,
    absorb: Option<StageMetrics>,
    output: Option<String>,
    error: Option<String>,
    confidence: Option<ConfidenceLevel>,
}

impl RunUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transitions the run to `status`.
    #[must_use]
    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Points the run at the stage currently executing.
    #[must_use]
    pub fn at_stage(mut self, role: StageRole) -> Self {
        self.current_stage = Some(role);
        self
    }

    /// Folds one stage's metrics into the run totals.
    #[must_use]
    pub fn absorb(mut self, metrics: StageMetrics) -> Self {
        self.absorb = Some(metrics);
        self
    }

    /// Sets the final output.
    #[must_use]
    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Sets the failure description.
    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Sets the final confidence.
    #[must_use]
    pub fn confidence(mut self, confidence: ConfidenceLevel) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Owns every in-flight and completed run.
///
/// Entries are keyed by run id with synchronized per-entry access: one
/// writer at a time per run, concurrent snapshot reads. The registry is
/// passed by reference to all components rather than accessed as ambient
/// global state.
pub struct RunRegistry {
    runs: DashMap<RunId, RunEntry>,
    max_input_len: usize,
}

impl RunRegistry {
    /// Creates a registry accepting inputs up to `max_input_len` bytes.
    #[must_use]
    pub fn new(max_input_len: usize) -> Self {
        Self {
            runs: DashMap::new(),
            max_input_len,
        }
    }

    /// Creates a run for a validated input.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for empty or oversized input; no run is
    /// created in that case.
    pub fn create(&self, input: &str) -> Result<RunId, ValidationError> {
        validate_run_input(input, self.max_input_len)?;

        let run = Run::new(input);
        let id = run.id;
        self.runs.insert(
            id,
            RunEntry {
                run,
                cancel: Arc::new(CancelFlag::new()),
            },
        );
        Ok(id)
    }

    /// Returns an immutable snapshot of a run.
    #[must_use]
    pub fn get(&self, id: RunId) -> Option<RunSnapshot> {
        self.runs.get(&id).map(|entry| RunSnapshot::from(&entry.run))
    }

    /// Returns the original input of a run.
    #[must_use]
    pub fn input(&self, id: RunId) -> Option<String> {
        self.runs.get(&id).map(|entry| entry.run.input.clone())
    }

    /// Requests cooperative cancellation of a run.
    ///
    /// Returns false (a no-op) for unknown or already-terminal runs. For a
    /// live run the flag is raised; the driver observes it at the next stage
    /// boundary and settles the run as cancelled.
    pub fn cancel(&self, id: RunId, reason: impl Into<String>) -> bool {
        match self.runs.get(&id) {
            Some(entry) if !entry.run.status.is_terminal() => {
                entry.cancel.cancel(reason);
                true
            }
            _ => false,
        }
    }

    /// Returns the cancellation flag the driver watches for a run.
    #[must_use]
    pub fn cancel_flag(&self, id: RunId) -> Option<Arc<CancelFlag>> {
        self.runs.get(&id).map(|entry| entry.cancel.clone())
    }

    /// Applies a driver update to a run.
    ///
    /// Status changes are validated against the forward-only transition
    /// table; entering `running` stamps `started_at`, entering a terminal
    /// status stamps `finished_at` and clears the stage pointer.
    ///
    /// # Errors
    ///
    /// Returns [`ConclaveError::UnknownRun`] for unknown ids and
    /// [`ConclaveError::Internal`] for an illegal status transition.
    pub fn advance(&self, id: RunId, update: RunUpdate) -> Result<RunSnapshot, ConclaveError> {
        let mut entry = self.runs.get_mut(&id).ok_or(ConclaveError::UnknownRun(id))?;
        let run = &mut entry.run;

        if let Some(next) = update.status {
            if !run.status.can_transition_to(next) {
                return Err(ConclaveError::Internal(format!(
                    "illegal run status transition {} -> {} for {id}",
                    run.status, next
                )));
            }
            run.status = next;
            if next == RunStatus::Running {
                run.started_at = Some(now_utc());
            }
            if next.is_terminal() {
                run.finished_at = Some(now_utc());
                run.current_stage = None;
            }
        }

        if let Some(role) = update.current_stage {
            if !run.status.is_terminal() {
                run.current_stage = Some(role);
            }
        }
        if let Some(metrics) = update.absorb {
            run.totals.absorb(&metrics);
        }
        if let Some(output) = update.output {
            run.output = Some(output);
        }
        if let Some(error) = update.error {
            run.error = Some(error);
        }
        if let Some(confidence) = update.confidence {
            run.confidence = Some(confidence);
        }

        Ok(RunSnapshot::from(&*run))
    }

    /// Returns the number of runs the registry holds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if the registry holds no runs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> RunRegistry {
        RunRegistry::new(64 * 1024)
    }

    #[test]
    fn test_create_validates_input() {
        let registry = registry();
        assert!(registry.create("").is_err());
        assert!(registry.create("   ").is_err());
        assert!(registry.create("Summarize X").is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_unknown_run() {
        assert!(registry().get(RunId::new()).is_none());
    }

    #[test]
    fn test_advance_forward_only() {
        let registry = registry();
        let id = registry.create("input").unwrap();

        registry
            .advance(id, RunUpdate::new().status(RunStatus::Running))
            .unwrap();
        registry
            .advance(id, RunUpdate::new().status(RunStatus::Success))
            .unwrap();

        // Terminal is terminal.
        assert!(registry
            .advance(id, RunUpdate::new().status(RunStatus::Running))
            .is_err());
        assert!(registry
            .advance(id, RunUpdate::new().status(RunStatus::Error))
            .is_err());
    }

    #[test]
    fn test_advance_stamps_timestamps() {
        let registry = registry();
        let id = registry.create("input").unwrap();

        let running = registry
            .advance(
                id,
                RunUpdate::new()
                    .status(RunStatus::Running)
                    .at_stage(StageRole::Analyst),
            )
            .unwrap();
        assert!(running.started_at.is_some());
        assert_eq!(running.current_stage, Some(StageRole::Analyst));

        let done = registry
            .advance(
                id,
                RunUpdate::new()
                    .status(RunStatus::Success)
                    .output("final"),
            )
            .unwrap();
        assert!(done.finished_at.is_some());
        assert!(done.finished_at.unwrap() >= done.started_at.unwrap());
        // The stage pointer clears once terminal.
        assert_eq!(done.current_stage, None);
        assert_eq!(done.output.as_deref(), Some("final"));
    }

    #[test]
    fn test_cancel_live_run() {
        let registry = registry();
        let id = registry.create("input").unwrap();

        assert!(registry.cancel(id, "client went away"));
        let flag = registry.cancel_flag(id).unwrap();
        assert!(flag.is_cancelled());
        assert_eq!(flag.reason(), Some("client went away".to_string()));
    }

    #[test]
    fn test_cancel_terminal_run_is_noop() {
        let registry = registry();
        let id = registry.create("input").unwrap();
        registry
            .advance(id, RunUpdate::new().status(RunStatus::Running))
            .unwrap();
        registry
            .advance(id, RunUpdate::new().status(RunStatus::Success))
            .unwrap();

        assert!(!registry.cancel(id, "too late"));
    }

    #[test]
    fn test_cancel_unknown_run_is_noop() {
        assert!(!registry().cancel(RunId::new(), "nothing there"));
    }

    #[test]
    fn test_snapshots_idempotent_for_unchanged_run() {
        let registry = registry();
        let id = registry.create("input").unwrap();

        let first = serde_json::to_string(&registry.get(id).unwrap()).unwrap();
        let second = serde_json::to_string(&registry.get(id).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_advance_absorbs_metrics() {
        let registry = registry();
        let id = registry.create("input").unwrap();
        registry
            .advance(id, RunUpdate::new().status(RunStatus::Running))
            .unwrap();

        let snapshot = registry
            .advance(
                id,
                RunUpdate::new().absorb(StageMetrics {
                    tokens_in: 10,
                    tokens_out: 20,
                    latency_ms: 30,
                }),
            )
            .unwrap();

        assert_eq!(snapshot.totals.total_tokens(), 30);
        assert_eq!(snapshot.totals.latency_ms, 30);
    }
}
