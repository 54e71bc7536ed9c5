//! The external interface of the orchestration core.
//!
//! Collaborators (UI, storage, provider clients) interact with runs only
//! through this facade: start, snapshot, cancel, subscribe. Execution
//! proceeds asynchronously; `start_run` returns as soon as the run is
//! registered.

use crate::audit::{AuditRecorder, InMemoryAuditRecorder, RetryingRecorder};
use crate::config::OrchestratorConfig;
use crate::core::RunId;
use crate::errors::ConclaveError;
use crate::events::{EventBroadcaster, EventSink, RunEvent};
use crate::executor::{Executor, ExecutorRegistry, QuotaPool};
use crate::pipeline::{PipelineDriver, RunOptions};
use crate::review::SignalCollector;
use crate::router::Router;
use crate::run::{RunRegistry, RunSnapshot};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Coordinates runs over a shared executor registry, audit recorder and
/// event broadcaster.
pub struct Orchestrator {
    registry: Arc<RunRegistry>,
    executors: Arc<ExecutorRegistry>,
    quota: Arc<QuotaPool>,
    audit: Arc<dyn AuditRecorder>,
    broadcaster: Arc<EventBroadcaster>,
    collector: Option<Arc<SignalCollector>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Starts building an orchestrator.
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Validates the input, creates a run and starts driving it.
    ///
    /// Returns immediately with the run id; progress is observed via
    /// [`subscribe`](Self::subscribe) or by polling
    /// [`get_run`](Self::get_run).
    ///
    /// # Errors
    ///
    /// Returns [`ConclaveError::Validation`] for rejected input; no run is
    /// created in that case.
    pub fn start_run(&self, input: &str, options: RunOptions) -> Result<RunId, ConclaveError> {
        let run_id = self.registry.create(input)?;
        self.broadcaster.register(run_id);

        let driver = PipelineDriver::new(
            self.registry.clone(),
            Router::new(self.executors.clone(), self.quota.clone()),
            self.audit.clone(),
            self.broadcaster.clone(),
            self.collector.clone(),
            self.config.clone(),
        );

        debug!(run_id = %run_id, plan = options.plan.name(), "spawning run driver");
        tokio::spawn(async move {
            driver.run(run_id, options).await;
        });

        Ok(run_id)
    }

    /// Returns a read-only snapshot of a run.
    ///
    /// Snapshots are idempotent: polling an unchanged run yields identical
    /// results. Polling never mutates state.
    #[must_use]
    pub fn get_run(&self, run_id: RunId) -> Option<RunSnapshot> {
        self.registry.get(run_id)
    }

    /// Requests cooperative cancellation of a run.
    ///
    /// Returns true if the request was accepted; false for unknown or
    /// already-terminal runs.
    pub fn cancel_run(&self, run_id: RunId) -> bool {
        self.registry.cancel(run_id, "cancellation requested by client")
    }

    /// Subscribes to a run's push event stream.
    ///
    /// # Errors
    ///
    /// Returns [`ConclaveError::UnknownRun`] when the run was never
    /// registered or its stream already closed; callers then degrade to
    /// polling [`get_run`](Self::get_run) with no server-side behavior
    /// change.
    pub fn subscribe(&self, run_id: RunId) -> Result<broadcast::Receiver<RunEvent>, ConclaveError> {
        self.broadcaster
            .subscribe(run_id)
            .ok_or(ConclaveError::UnknownRun(run_id))
    }

    /// The audit recorder, for trail inspection.
    #[must_use]
    pub fn audit(&self) -> Arc<dyn AuditRecorder> {
        self.audit.clone()
    }

    /// The executor registry backing the router.
    #[must_use]
    pub fn executors(&self) -> &Arc<ExecutorRegistry> {
        &self.executors
    }

    /// The shared quota pool.
    #[must_use]
    pub fn quota(&self) -> &Arc<QuotaPool> {
        &self.quota
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("executors", &self.executors.len())
            .field("runs", &self.registry.len())
            .finish()
    }
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    executors: Option<Arc<ExecutorRegistry>>,
    quota: Option<Arc<QuotaPool>>,
    audit: Option<Arc<dyn AuditRecorder>>,
    sink: Option<Arc<dyn EventSink>>,
    reviewers: Vec<Arc<dyn Executor>>,
    config: Option<OrchestratorConfig>,
}

impl OrchestratorBuilder {
    /// Sets the executor registry.
    #[must_use]
    pub fn executors(mut self, executors: Arc<ExecutorRegistry>) -> Self {
        self.executors = Some(executors);
        self
    }

    /// Sets the shared quota pool.
    #[must_use]
    pub fn quota(mut self, quota: Arc<QuotaPool>) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Sets the audit persistence collaborator.
    ///
    /// The recorder is wrapped with the configured bounded-retry policy.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditRecorder>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Attaches an observability sink for run events.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Enables third-party review collection with the given reviewers.
    #[must_use]
    pub fn reviewers(mut self, reviewers: Vec<Arc<dyn Executor>>) -> Self {
        self.reviewers = reviewers;
        self
    }

    /// Sets the orchestrator configuration.
    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the orchestrator.
    #[must_use]
    pub fn build(self) -> Orchestrator {
        let config = self.config.unwrap_or_default();

        let executors = self
            .executors
            .unwrap_or_else(|| Arc::new(ExecutorRegistry::new()));
        let quota = self.quota.unwrap_or_else(|| Arc::new(QuotaPool::new()));

        let inner_audit = self
            .audit
            .unwrap_or_else(|| Arc::new(InMemoryAuditRecorder::new()));
        let audit: Arc<dyn AuditRecorder> = Arc::new(RetryingRecorder::new(
            inner_audit,
            config.audit_retry.clone(),
        ));

        let mut broadcaster = EventBroadcaster::new(config.event_capacity);
        if let Some(sink) = self.sink {
            broadcaster = broadcaster.with_sink(sink);
        }

        let collector = if self.reviewers.is_empty() {
            None
        } else {
            Some(Arc::new(
                SignalCollector::new(self.reviewers)
                    .with_reviewer_timeout(config.reviewer_timeout)
                    .with_window(config.review_window),
            ))
        };

        Orchestrator {
            registry: Arc::new(RunRegistry::new(config.max_input_len)),
            executors,
            quota,
            audit,
            broadcaster: Arc::new(broadcaster),
            collector,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Capability;
    use crate::testing::ScriptedExecutor;

    #[tokio::test]
    async fn test_start_run_rejects_invalid_input() {
        let orchestrator = Orchestrator::builder().build();
        let result = orchestrator.start_run("   ", RunOptions::default());
        assert!(matches!(result, Err(ConclaveError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_run_queries() {
        let orchestrator = Orchestrator::builder().build();
        let unknown = RunId::new();

        assert!(orchestrator.get_run(unknown).is_none());
        assert!(!orchestrator.cancel_run(unknown));
        assert!(matches!(
            orchestrator.subscribe(unknown),
            Err(ConclaveError::UnknownRun(_))
        ));
    }

    #[tokio::test]
    async fn test_start_run_returns_immediately_with_live_snapshot() {
        let executors = Arc::new(ExecutorRegistry::new());
        executors
            .register(Arc::new(ScriptedExecutor::new(
                "omni",
                &[Capability::Analysis, Capability::Synthesis],
                &["a", "b"],
            )))
            .unwrap();

        let orchestrator = Orchestrator::builder().executors(executors).build();
        let run_id = orchestrator
            .start_run(
                "Summarize X",
                RunOptions::new(
                    crate::pipeline::StagePlan::chain(
                        "two",
                        &[
                            crate::core::StageRole::Analyst,
                            crate::core::StageRole::Synthesizer,
                        ],
                    )
                    .unwrap(),
                ),
            )
            .unwrap();

        // The snapshot is observable right away, whatever its status.
        assert!(orchestrator.get_run(run_id).is_some());
    }
}
