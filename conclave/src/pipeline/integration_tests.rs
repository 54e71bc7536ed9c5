//! End-to-end pipeline scenarios.

use crate::config::{OrchestratorConfig, RetryConfig};
use crate::core::{ConfidenceLevel, RunId, RunStatus, StageRole, StageStatus};
use crate::errors::ConclaveError;
use crate::events::{CollectingEventSink, RunEventKind};
use crate::executor::{Capability, Executor, ExecutorRegistry};
use crate::orchestrator::Orchestrator;
use crate::pipeline::{RunOptions, StagePlan};
use crate::run::RunSnapshot;
use crate::testing::{verdict_json, FailingExecutor, FlakyAuditRecorder, ScriptedExecutor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

const SIX_ROLES: [StageRole; 6] = [
    StageRole::Analyst,
    StageRole::Researcher,
    StageRole::Creator,
    StageRole::Critic,
    StageRole::Council,
    StageRole::Synthesizer,
];

const ALL_CAPABILITIES: [Capability; 6] = [
    Capability::Analysis,
    Capability::Research,
    Capability::Drafting,
    Capability::Critique,
    Capability::Judging,
    Capability::Synthesis,
];

async fn wait_terminal(orchestrator: &Orchestrator, run_id: RunId) -> RunSnapshot {
    tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            if let Some(snapshot) = orchestrator.get_run(run_id) {
                if snapshot.status.is_terminal() {
                    return snapshot;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("run did not reach a terminal status in time")
}

fn registry_of(executors: Vec<Arc<dyn Executor>>) -> Arc<ExecutorRegistry> {
    let registry = Arc::new(ExecutorRegistry::new());
    for executor in executors {
        registry.register(executor).unwrap();
    }
    registry
}

fn fast_audit_retry() -> RetryConfig {
    RetryConfig::new()
        .with_max_attempts(2)
        .with_base_delay_ms(1)
        .with_max_delay_ms(2)
}

#[tokio::test]
async fn test_six_stage_chain_end_to_end() -> anyhow::Result<()> {
    let omni = Arc::new(ScriptedExecutor::new(
        "omni",
        &ALL_CAPABILITIES,
        &["A1", "A2", "A3", "A4", "A5", "A6"],
    ));
    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![omni.clone()]))
        .build();

    let plan = StagePlan::chain("six", &SIX_ROLES)?;
    let run_id = orchestrator.start_run("Summarize X", RunOptions::new(plan))?;

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    assert_eq!(snapshot.status, RunStatus::Success);
    assert_eq!(snapshot.output.as_deref(), Some("A6"));
    assert!(snapshot.error.is_none());
    // No reviewers configured, so no confidence was scored.
    assert_eq!(snapshot.confidence, None);
    assert_eq!(omni.call_count(), 6);

    // The audit trail holds exactly six stage records, in stage order, all
    // done, with non-decreasing timestamps.
    let stages = orchestrator.audit().stages(run_id).await?;
    assert_eq!(stages.len(), 6);
    for (record, role) in stages.iter().zip(SIX_ROLES) {
        assert_eq!(record.role, role);
        assert_eq!(record.status, StageStatus::Done);
        assert_eq!(record.run_id, run_id);
    }
    for pair in stages.windows(2) {
        assert!(pair[0].finished_at.unwrap() >= pair[0].started_at.unwrap());
        assert!(pair[1].started_at.unwrap() >= pair[0].finished_at.unwrap());
    }

    // Totals absorbed one reply's metrics per stage.
    assert_eq!(snapshot.totals.total_tokens(), 6 * 15);
    Ok(())
}

#[tokio::test]
async fn test_event_stream_for_chain() -> anyhow::Result<()> {
    let sink = Arc::new(CollectingEventSink::new());
    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![Arc::new(ScriptedExecutor::new(
            "omni",
            &ALL_CAPABILITIES,
            &["A1", "A2", "A3", "A4", "A5", "A6"],
        ))]))
        .event_sink(sink.clone())
        .build();

    let plan = StagePlan::chain("six", &SIX_ROLES)?;
    let run_id = orchestrator.start_run("Summarize X", RunOptions::new(plan))?;

    // Subscribing before yielding to the runtime observes the whole stream.
    let mut events = orchestrator.subscribe(run_id)?;
    let mut kinds = Vec::new();
    loop {
        match events.recv().await {
            Ok(event) => kinds.push(event.kind),
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(_)) => {}
        }
    }

    assert_eq!(kinds.first(), Some(&RunEventKind::Progress));
    assert_eq!(kinds.last(), Some(&RunEventKind::Complete));
    let count = |kind: RunEventKind| kinds.iter().filter(|k| **k == kind).count();
    assert_eq!(count(RunEventKind::StageStart), 6);
    assert_eq!(count(RunEventKind::StageEnd), 6);
    assert_eq!(count(RunEventKind::Progress), 7);
    assert_eq!(count(RunEventKind::Complete), 1);
    assert_eq!(count(RunEventKind::Error), 0);

    // The sink saw the same stream.
    assert_eq!(sink.len(), kinds.len());

    // Once the stream closed, new subscriptions degrade to polling.
    assert!(matches!(
        orchestrator.subscribe(run_id),
        Err(ConclaveError::UnknownRun(_))
    ));
    assert!(orchestrator.get_run(run_id).is_some());
    Ok(())
}

#[tokio::test]
async fn test_specialist_council_with_one_timeout() -> anyhow::Result<()> {
    // Call 0 is the framing stage; calls 1-5 are the five specialists, one
    // of which sleeps past the sub-task timeout.
    let brain = Arc::new(
        ScriptedExecutor::new(
            "brain",
            &[Capability::Analysis],
            &["framing", "s1", "s2", "slow", "s4", "s5"],
        )
        .with_delay_at(3, Duration::from_secs(60)),
    );
    let verdict_reply = verdict_json(1);
    let judge = Arc::new(ScriptedExecutor::new(
        "judge",
        &[Capability::Judging],
        &[verdict_reply.as_str()],
    ));
    let synth = Arc::new(ScriptedExecutor::new(
        "synth",
        &[Capability::Synthesis],
        &["final synthesis"],
    ));

    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![brain, judge, synth]))
        .config(OrchestratorConfig::new().with_subtask_timeout(Duration::from_millis(200)))
        .build();

    let run_id = orchestrator.start_run(
        "Assess the proposal",
        RunOptions::new(StagePlan::specialist_council()),
    )?;

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    assert_eq!(snapshot.status, RunStatus::Success);
    assert_eq!(snapshot.output.as_deref(), Some("final synthesis"));

    let stages = orchestrator.audit().stages(run_id).await?;
    // framing + five specialists + council + synthesis
    assert_eq!(stages.len(), 8);

    let specialists: Vec<_> = stages
        .iter()
        .filter(|r| r.role == StageRole::Specialist)
        .collect();
    assert_eq!(specialists.len(), 5);
    assert_eq!(
        specialists
            .iter()
            .filter(|r| r.status == StageStatus::Done)
            .count(),
        4
    );
    let timed_out: Vec<_> = specialists
        .iter()
        .filter(|r| r.status == StageStatus::Error)
        .collect();
    assert_eq!(timed_out.len(), 1);
    assert!(timed_out[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("timed out"));

    // The verdict selects among the four successes.
    let verdict = orchestrator.audit().verdict(run_id).await?.unwrap();
    assert_eq!(verdict.selected, 1);
    assert!(verdict.selected < 4);
    Ok(())
}

#[tokio::test]
async fn test_cancellation_before_later_stages() -> anyhow::Result<()> {
    let executor = Arc::new(
        ScriptedExecutor::new(
            "worker",
            &[Capability::Analysis, Capability::Research, Capability::Critique],
            &["a1", "a2", "a3"],
        )
        .with_delay_at(0, Duration::from_millis(300)),
    );
    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![executor.clone()]))
        .build();

    let plan = StagePlan::chain(
        "three",
        &[StageRole::Analyst, StageRole::Researcher, StageRole::Critic],
    )?;
    let run_id = orchestrator.start_run("Summarize X", RunOptions::new(plan))?;

    // Cancel while stage one is still in flight.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(orchestrator.cancel_run(run_id));

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    assert_eq!(snapshot.status, RunStatus::Cancelled);

    // Stage one finished and is persisted; stages two and three never ran.
    let stages = orchestrator.audit().stages(run_id).await?;
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].role, StageRole::Analyst);
    assert_eq!(stages[0].status, StageStatus::Done);
    assert_eq!(executor.call_count(), 1);

    // Cancelling a terminal run is a no-op.
    assert!(!orchestrator.cancel_run(run_id));
    Ok(())
}

#[tokio::test]
async fn test_fallback_recovers_solo_stage() -> anyhow::Result<()> {
    // The failing executor is cheaper, so the router picks it first; the
    // fallback selection must exclude it and land on the backup.
    let flaky = Arc::new(
        FailingExecutor::new("flaky", &[Capability::Drafting], "connection reset").with_cost(0.5),
    );
    let backup = Arc::new(
        ScriptedExecutor::new("backup", &[Capability::Drafting], &["the draft"]).with_cost(1.0),
    );

    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![flaky.clone(), backup]))
        .build();

    let plan = StagePlan::chain("draft", &[StageRole::Creator])?;
    let run_id = orchestrator.start_run("Draft it", RunOptions::new(plan))?;

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    assert_eq!(snapshot.status, RunStatus::Success);
    assert_eq!(snapshot.output.as_deref(), Some("the draft"));
    assert_eq!(flaky.call_count(), 1);

    let stages = orchestrator.audit().stages(run_id).await?;
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].status, StageStatus::Done);
    // The record names the executor that actually produced the output.
    assert_eq!(stages[0].executor.as_ref().unwrap().as_str(), "backup");
    Ok(())
}

#[tokio::test]
async fn test_fallback_exhaustion_fails_run() -> anyhow::Result<()> {
    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![
            Arc::new(FailingExecutor::new(
                "down-a",
                &[Capability::Drafting],
                "unreachable",
            )),
            Arc::new(FailingExecutor::new(
                "down-b",
                &[Capability::Drafting],
                "unreachable",
            )),
        ]))
        .build();

    let plan = StagePlan::chain("draft", &[StageRole::Creator])?;
    let run_id = orchestrator.start_run("Draft it", RunOptions::new(plan))?;

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    assert_eq!(snapshot.status, RunStatus::Error);
    assert!(snapshot
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("transport error"));

    // The failed stage is preserved for audit.
    let stages = orchestrator.audit().stages(run_id).await?;
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].status, StageStatus::Error);
    Ok(())
}

#[tokio::test]
async fn test_no_executor_available_fails_run() -> anyhow::Result<()> {
    // The only registered executor cannot judge.
    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![Arc::new(ScriptedExecutor::new(
            "analyst-only",
            &[Capability::Analysis],
            &["a1"],
        ))]))
        .build();

    let plan = StagePlan::chain("two", &[StageRole::Analyst, StageRole::Council])?;
    let run_id = orchestrator.start_run("Summarize X", RunOptions::new(plan))?;

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    assert_eq!(snapshot.status, RunStatus::Error);
    assert!(snapshot
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("no executor available"));

    // The completed first stage stayed persisted.
    let stages = orchestrator.audit().stages(run_id).await?;
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[0].status, StageStatus::Done);
    assert_eq!(stages[1].status, StageStatus::Error);
    Ok(())
}

#[tokio::test]
async fn test_degraded_run_still_returns_output() -> anyhow::Result<()> {
    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![Arc::new(ScriptedExecutor::new(
            "omni",
            &[Capability::Analysis],
            &["a1"],
        ))]))
        .audit(Arc::new(FlakyAuditRecorder::failing(1000)))
        .config(OrchestratorConfig::new().with_audit_retry(fast_audit_retry()))
        .build();

    let plan = StagePlan::chain("one", &[StageRole::Analyst])?;
    let run_id = orchestrator.start_run("Summarize X", RunOptions::new(plan))?;

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    // The audit store never recovered, but the computed output is returned.
    assert_eq!(snapshot.status, RunStatus::Degraded);
    assert_eq!(snapshot.output.as_deref(), Some("a1"));
    Ok(())
}

#[tokio::test]
async fn test_review_signals_raise_confidence() -> anyhow::Result<()> {
    let reviewers: Vec<Arc<dyn Executor>> = vec![
        Arc::new(ScriptedExecutor::new(
            "reviewer-1",
            &[Capability::Review],
            &["AGREE: conclusions hold"],
        )),
        Arc::new(ScriptedExecutor::new(
            "reviewer-2",
            &[Capability::Review],
            &["AGREE: sound work"],
        )),
        Arc::new(ScriptedExecutor::new(
            "reviewer-3",
            &[Capability::Review],
            &["MIXED: some gaps"],
        )),
    ];

    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![Arc::new(ScriptedExecutor::new(
            "omni",
            &[Capability::Analysis, Capability::Synthesis],
            &["a1", "a2"],
        ))]))
        .reviewers(reviewers)
        .build();

    let plan = StagePlan::chain("two", &[StageRole::Analyst, StageRole::Synthesizer])?;
    let run_id = orchestrator.start_run("Summarize X", RunOptions::new(plan))?;

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    assert_eq!(snapshot.status, RunStatus::Success);
    assert_eq!(snapshot.confidence, Some(ConfidenceLevel::High));

    let reviews = orchestrator.audit().reviews(run_id).await?;
    assert_eq!(reviews.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_reviews_can_be_disabled_per_run() -> anyhow::Result<()> {
    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![Arc::new(ScriptedExecutor::new(
            "omni",
            &[Capability::Analysis, Capability::Synthesis],
            &["a1", "a2"],
        ))]))
        .reviewers(vec![Arc::new(ScriptedExecutor::new(
            "reviewer-1",
            &[Capability::Review],
            &["AGREE"],
        ))])
        .build();

    let plan = StagePlan::chain("two", &[StageRole::Analyst, StageRole::Synthesizer])?;
    let run_id = orchestrator.start_run(
        "Summarize X",
        RunOptions::new(plan).with_reviews(false),
    )?;

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    assert_eq!(snapshot.status, RunStatus::Success);
    assert_eq!(snapshot.confidence, None);
    assert!(orchestrator.audit().reviews(run_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_polling_is_idempotent_after_terminal() -> anyhow::Result<()> {
    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![Arc::new(ScriptedExecutor::new(
            "omni",
            &[Capability::Analysis],
            &["a1"],
        ))]))
        .build();

    let plan = StagePlan::chain("one", &[StageRole::Analyst])?;
    let run_id = orchestrator.start_run("Summarize X", RunOptions::new(plan))?;
    wait_terminal(&orchestrator, run_id).await;

    let first = serde_json::to_string(&orchestrator.get_run(run_id).unwrap())?;
    let second = serde_json::to_string(&orchestrator.get_run(run_id).unwrap())?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_deliberation_pipeline_full_path() -> anyhow::Result<()> {
    // Drafting fans out to three siblings on one drafting executor; the
    // council judges them; critique and synthesis close the run.
    let drafter = Arc::new(ScriptedExecutor::new(
        "drafter",
        &[Capability::Drafting],
        &["draft-a", "draft-b", "draft-c"],
    ));
    let thinker = Arc::new(ScriptedExecutor::new(
        "thinker",
        &[
            Capability::Analysis,
            Capability::Research,
            Capability::Critique,
            Capability::Synthesis,
        ],
        &["framing", "research", "critique", "the answer"],
    ));
    let verdict_reply = verdict_json(2);
    let judge = Arc::new(ScriptedExecutor::new(
        "judge",
        &[Capability::Judging],
        &[verdict_reply.as_str()],
    ));

    let orchestrator = Orchestrator::builder()
        .executors(registry_of(vec![drafter.clone(), thinker, judge]))
        .build();

    let run_id = orchestrator.start_run(
        "Answer the question",
        RunOptions::new(StagePlan::deliberation(3)),
    )?;

    let snapshot = wait_terminal(&orchestrator, run_id).await;
    assert_eq!(snapshot.status, RunStatus::Success);
    assert_eq!(snapshot.output.as_deref(), Some("the answer"));
    assert_eq!(drafter.call_count(), 3);

    let stages = orchestrator.audit().stages(run_id).await?;
    // analyst + researcher + three drafts + council + critic + synthesizer
    assert_eq!(stages.len(), 8);
    let verdict = orchestrator.audit().verdict(run_id).await?.unwrap();
    assert_eq!(verdict.selected, 2);

    // The critic consumed the verdict context, not the raw drafts.
    let critic = stages
        .iter()
        .find(|r| r.role == StageRole::Critic)
        .unwrap();
    assert!(critic.input_snapshot.contains("Selected candidate (2)"));
    assert!(critic.input_snapshot.contains("draft-"));
    Ok(())
}
