//! The stage graph executor.
//!
//! Walks a run through its fixed plan: sequential stages consume the
//! accumulated upstream context, fan-out stages run under the join barrier
//! in `fanout`, and the judge step collapses the batch into a verdict. The
//! driver is the only writer of run state besides the cancellation path, and
//! it awaits every audit append before advancing (write-before-advance).

use super::fanout::{run_batch, FanOutBatch};
use super::plan::{StagePlan, StepMode};
use crate::audit::AuditRecorder;
use crate::config::OrchestratorConfig;
use crate::core::{RunId, RunStatus, StageRecord, StageRole, StageStatus};
use crate::errors::{AggregationError, ExecutorFailure};
use crate::events::{EventBroadcaster, RunEvent};
use crate::executor::{Executor, ExecutorReply, InvokeBudget};
use crate::judge::Aggregator;
use crate::review::{self, ReviewSignal, SignalCollector};
use crate::router::Router;
use crate::run::{CancelFlag, RunRegistry, RunUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Review summaries are compressed to this many characters.
const REVIEW_SUMMARY_MAX_CHARS: usize = 4000;

/// Per-run execution options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// The plan to walk.
    pub plan: StagePlan,
    /// Budget applied to every routed call.
    pub budget: InvokeBudget,
    /// Whether to collect third-party reviews. Only effective when the
    /// orchestrator has reviewers configured.
    pub collect_reviews: bool,
}

impl RunOptions {
    /// Creates options for a plan with an unlimited budget and reviews on.
    #[must_use]
    pub fn new(plan: StagePlan) -> Self {
        Self {
            plan,
            budget: InvokeBudget::unlimited(),
            collect_reviews: true,
        }
    }

    /// Sets the per-call budget.
    #[must_use]
    pub fn with_budget(mut self, budget: InvokeBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Enables or disables review collection for this run.
    #[must_use]
    pub fn with_reviews(mut self, collect: bool) -> Self {
        self.collect_reviews = collect;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(StagePlan::deliberation(3))
    }
}

/// Accumulated upstream context: the original input plus every `done`
/// output, in stage order. A stage's output joins the context only after
/// that stage settles as done.
#[derive(Debug, Clone)]
struct RunContext {
    input: String,
    entries: Vec<(StageRole, String)>,
}

impl RunContext {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            entries: Vec::new(),
        }
    }

    fn push(&mut self, role: StageRole, text: impl Into<String>) {
        self.entries.push((role, text.into()));
    }

    fn composed(&self) -> String {
        let mut out = self.input.clone();
        for (role, text) in &self.entries {
            out.push_str("\n\n[");
            out.push_str(&role.to_string());
            out.push_str("]\n");
            out.push_str(text);
        }
        out
    }

    fn last_output(&self) -> Option<&str> {
        self.entries.last().map(|(_, text)| text.as_str())
    }

    fn summary(&self, max_chars: usize) -> String {
        let composed = self.composed();
        if composed.chars().count() <= max_chars {
            composed
        } else {
            composed.chars().take(max_chars).collect()
        }
    }
}

/// Drives runs through their stage plans.
#[derive(Clone)]
pub struct PipelineDriver {
    registry: Arc<RunRegistry>,
    router: Router,
    audit: Arc<dyn AuditRecorder>,
    broadcaster: Arc<EventBroadcaster>,
    collector: Option<Arc<SignalCollector>>,
    config: OrchestratorConfig,
}

impl PipelineDriver {
    /// Creates a driver over the orchestrator's shared components.
    #[must_use]
    pub fn new(
        registry: Arc<RunRegistry>,
        router: Router,
        audit: Arc<dyn AuditRecorder>,
        broadcaster: Arc<EventBroadcaster>,
        collector: Option<Arc<SignalCollector>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            router,
            audit,
            broadcaster,
            collector,
            config,
        }
    }

    /// Executes one run to a terminal status.
    ///
    /// Never returns an error to the spawner: every outcome, including
    /// failure and cancellation, is recorded on the run itself.
    pub async fn run(&self, run_id: RunId, options: RunOptions) {
        let Some(cancel) = self.registry.cancel_flag(run_id) else {
            error!(run_id = %run_id, "driver started for unknown run");
            return;
        };
        let Some(input) = self.registry.input(run_id) else {
            error!(run_id = %run_id, "driver started for unknown run");
            return;
        };

        let plan = options.plan;
        let budget = options.budget;
        let total = plan.len();

        self.advance(
            run_id,
            RunUpdate::new().status(RunStatus::Running),
        );
        self.broadcaster.publish(RunEvent::progress(run_id, 0, total));
        info!(run_id = %run_id, plan = plan.name(), stages = total, "run started");

        let mut ctx = RunContext::new(input);
        let mut pending_batch: Option<FanOutBatch> = None;
        let mut review_handle: Option<JoinHandle<Vec<ReviewSignal>>> = None;
        let mut degraded = false;

        for (idx, step) in plan.steps().iter().enumerate() {
            // Cancellation is checked before every stage; stages already
            // completed stay persisted.
            if cancel.is_cancelled() {
                abort_reviews(&mut review_handle);
                self.settle_cancelled(run_id, &cancel);
                return;
            }

            self.advance(run_id, RunUpdate::new().at_stage(step.role));

            match step.mode {
                StepMode::Solo => {
                    if !self
                        .execute_solo(run_id, step.role, &mut ctx, &budget, &mut degraded)
                        .await
                    {
                        abort_reviews(&mut review_handle);
                        return;
                    }
                }
                StepMode::FanOut { width } => {
                    let batch = run_batch(
                        run_id,
                        step.role,
                        width,
                        &ctx.composed(),
                        &self.router,
                        &budget,
                        &self.broadcaster,
                        &cancel,
                        self.config.subtask_timeout,
                        self.config.max_parallel,
                    )
                    .await;

                    for record in &batch.records {
                        self.append_stage(record, &mut degraded).await;
                        if record.status == StageStatus::Done {
                            self.advance(run_id, RunUpdate::new().absorb(record.metrics));
                        }
                    }

                    if cancel.is_cancelled() {
                        abort_reviews(&mut review_handle);
                        self.settle_cancelled(run_id, &cancel);
                        return;
                    }

                    if !batch.has_candidates() {
                        abort_reviews(&mut review_handle);
                        self.settle_error(
                            run_id,
                            None,
                            &AggregationError::NoCandidates.to_string(),
                        );
                        return;
                    }

                    debug!(
                        run_id = %run_id,
                        batch_id = %batch.id,
                        candidates = batch.candidates.len(),
                        "fan-out joined"
                    );
                    pending_batch = Some(batch);
                }
                StepMode::Judge => {
                    let Some(batch) = pending_batch.take() else {
                        abort_reviews(&mut review_handle);
                        self.settle_error(
                            run_id,
                            None,
                            "judge step reached without a fan-out batch",
                        );
                        return;
                    };
                    if !self
                        .execute_judge(run_id, step.role, &mut ctx, &budget, batch, &mut degraded)
                        .await
                    {
                        abort_reviews(&mut review_handle);
                        return;
                    }
                }
            }

            self.broadcaster
                .publish(RunEvent::progress(run_id, idx + 1, total));

            if plan.review_after() == Some(idx) && options.collect_reviews {
                if let Some(collector) = self.collector.clone() {
                    let summary = ctx.summary(REVIEW_SUMMARY_MAX_CHARS);
                    debug!(run_id = %run_id, reviewers = collector.reviewer_count(), "launching review collection");
                    review_handle = Some(tokio::spawn(async move {
                        collector.collect(run_id, summary).await
                    }));
                }
            }
        }

        if cancel.is_cancelled() {
            abort_reviews(&mut review_handle);
            self.settle_cancelled(run_id, &cancel);
            return;
        }

        // Fold in whatever the review window produced. The await is bounded
        // by the collector's own window.
        let mut confidence = None;
        if let Some(handle) = review_handle.take() {
            match handle.await {
                Ok(signals) => {
                    for signal in &signals {
                        if let Err(err) = self.audit.append_review(signal.clone()).await {
                            error!(run_id = %run_id, error = %err, "review append failed");
                            degraded = true;
                        }
                    }
                    confidence = Some(review::confidence(&signals));
                }
                Err(join_err) => {
                    warn!(run_id = %run_id, error = %join_err, "review collection task failed");
                    confidence = Some(review::confidence(&[]));
                }
            }
        }

        let output = ctx.last_output().unwrap_or_default().to_string();
        let status = if degraded {
            RunStatus::Degraded
        } else {
            RunStatus::Success
        };

        let mut update = RunUpdate::new().status(status).output(output.clone());
        if let Some(level) = confidence {
            update = update.confidence(level);
        }
        self.advance(run_id, update);
        self.broadcaster.publish(RunEvent::complete(
            run_id,
            status,
            Some(&output),
            confidence,
        ));
        info!(run_id = %run_id, status = %status, "run finished");
    }

    /// Executes one solo stage with the single-fallback policy.
    ///
    /// Returns false when the stage failed and the run was settled as an
    /// error.
    async fn execute_solo(
        &self,
        run_id: RunId,
        role: StageRole,
        ctx: &mut RunContext,
        budget: &InvokeBudget,
        degraded: &mut bool,
    ) -> bool {
        let composed = ctx.composed();
        let mut record = StageRecord::pending(run_id, role);

        match self.routed_invoke(&mut record, role, &composed, budget).await {
            Ok(reply) => {
                let metrics = reply.metrics();
                record.complete(reply.text.clone(), metrics);
                self.append_stage(&record, degraded).await;
                self.broadcaster.publish(RunEvent::stage_end(&record));
                self.advance(run_id, RunUpdate::new().absorb(metrics));
                ctx.push(role, reply.text);
                true
            }
            Err(reason) => {
                record.fail(reason.clone());
                let stage_id = record.id;
                self.append_stage(&record, degraded).await;
                if record.started_at.is_some() {
                    self.broadcaster.publish(RunEvent::stage_end(&record));
                }
                self.settle_error(run_id, Some(stage_id), &reason);
                false
            }
        }
    }

    /// Executes the judge stage over a joined batch.
    ///
    /// Returns false when the stage failed and the run was settled as an
    /// error.
    async fn execute_judge(
        &self,
        run_id: RunId,
        role: StageRole,
        ctx: &mut RunContext,
        budget: &InvokeBudget,
        batch: FanOutBatch,
        degraded: &mut bool,
    ) -> bool {
        let brief = Aggregator::compose_brief(&ctx.composed(), &batch.candidates);
        let mut record = StageRecord::pending(run_id, role);

        let reply = match self.routed_invoke(&mut record, role, &brief, budget).await {
            Ok(reply) => reply,
            Err(reason) => {
                record.fail(reason.clone());
                let stage_id = record.id;
                self.append_stage(&record, degraded).await;
                if record.started_at.is_some() {
                    self.broadcaster.publish(RunEvent::stage_end(&record));
                }
                self.settle_error(run_id, Some(stage_id), &reason);
                return false;
            }
        };

        match Aggregator::resolve(&reply.text, batch.candidates.len()) {
            Ok(verdict) => {
                let metrics = reply.metrics();
                record.complete(reply.text, metrics);
                self.append_stage(&record, degraded).await;
                self.broadcaster.publish(RunEvent::stage_end(&record));
                self.advance(run_id, RunUpdate::new().absorb(metrics));

                if let Err(err) = self.audit.append_verdict(run_id, verdict.clone()).await {
                    error!(run_id = %run_id, error = %err, "verdict append failed");
                    *degraded = true;
                }

                ctx.push(role, Aggregator::verdict_context(&verdict, &batch.candidates));
                true
            }
            Err(agg_err) => {
                let reason = agg_err.to_string();
                record.fail(reason.clone());
                let stage_id = record.id;
                self.append_stage(&record, degraded).await;
                self.broadcaster.publish(RunEvent::stage_end(&record));
                self.settle_error(run_id, Some(stage_id), &reason);
                false
            }
        }
    }

    /// Routes a stage, invokes it, and applies the fallback policy: on an
    /// executor failure the router is asked for a distinct executor, up to
    /// the configured number of fallback attempts.
    ///
    /// On success the record is begun (and `stage_start` published) exactly
    /// once; the record's executor always names the one that produced the
    /// outcome.
    async fn routed_invoke(
        &self,
        record: &mut StageRecord,
        role: StageRole,
        context: &str,
        budget: &InvokeBudget,
    ) -> Result<ExecutorReply, String> {
        let executor = match self.router.route(role, budget) {
            Ok(executor) => executor,
            Err(err) => return Err(err.to_string()),
        };

        record.begin(executor.id().clone(), context.to_string());
        self.broadcaster.publish(RunEvent::stage_start(record));

        let mut failure = match self
            .invoke_once(executor, role, context, budget, self.config.stage_timeout)
            .await
        {
            Ok(reply) => return Ok(reply),
            Err(failure) => failure,
        };

        for attempt in 0..self.config.fallback_attempts {
            let failed = failure.executor().clone();
            warn!(
                run_id = %record.run_id,
                role = %role,
                failed = %failed,
                attempt = attempt + 1,
                error = %failure,
                "executor failed; routing fallback"
            );

            let Ok(fallback) = self.router.route_excluding(role, budget, Some(&failed)) else {
                // No distinct fallback exists; the original failure stands.
                break;
            };

            record.executor = Some(fallback.id().clone());
            match self
                .invoke_once(fallback, role, context, budget, self.config.stage_timeout)
                .await
            {
                Ok(reply) => return Ok(reply),
                Err(next_failure) => failure = next_failure,
            }
        }

        Err(failure.to_string())
    }

    /// Invokes one executor under the stage timeout, consuming quota first.
    async fn invoke_once(
        &self,
        executor: Arc<dyn Executor>,
        role: StageRole,
        context: &str,
        budget: &InvokeBudget,
        timeout: Duration,
    ) -> Result<ExecutorReply, ExecutorFailure> {
        let id = executor.id().clone();
        if !self.router.consume_quota(&id) {
            return Err(ExecutorFailure::rejected(
                id,
                "quota exhausted at invoke time",
            ));
        }

        match tokio::time::timeout(timeout, executor.invoke(role, context, budget)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorFailure::timeout(id, timeout.as_millis() as u64)),
        }
    }

    /// Appends a stage record, marking the run degraded when the audit
    /// store's retries are exhausted.
    async fn append_stage(&self, record: &StageRecord, degraded: &mut bool) {
        if let Err(err) = self.audit.append_stage(record.clone()).await {
            error!(
                run_id = %record.run_id,
                stage_id = %record.id,
                error = %err,
                "stage append failed; run will be degraded"
            );
            *degraded = true;
        }
    }

    fn advance(&self, run_id: RunId, update: RunUpdate) {
        if let Err(err) = self.registry.advance(run_id, update) {
            error!(run_id = %run_id, error = %err, "registry advance failed");
        }
    }

    fn settle_error(&self, run_id: RunId, stage_id: Option<Uuid>, reason: &str) {
        self.advance(
            run_id,
            RunUpdate::new().status(RunStatus::Error).error(reason),
        );
        self.broadcaster
            .publish(RunEvent::error(run_id, stage_id, reason));
        info!(run_id = %run_id, reason = %reason, "run failed");
    }

    fn settle_cancelled(&self, run_id: RunId, cancel: &CancelFlag) {
        let reason = cancel
            .reason()
            .unwrap_or_else(|| "cancellation requested".to_string());
        self.advance(run_id, RunUpdate::new().status(RunStatus::Cancelled));
        self.broadcaster.publish(RunEvent::complete(
            run_id,
            RunStatus::Cancelled,
            None,
            None,
        ));
        info!(run_id = %run_id, reason = %reason, "run cancelled");
    }
}

impl std::fmt::Debug for PipelineDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDriver")
            .field("config", &self.config)
            .finish()
    }
}

fn abort_reviews(handle: &mut Option<JoinHandle<Vec<ReviewSignal>>>) {
    if let Some(handle) = handle.take() {
        handle.abort();
    }
}
