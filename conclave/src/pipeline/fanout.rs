//! Bounded-parallel fan-out batches with a join barrier.

use crate::core::{RunId, StageRecord, StageRole, StageStatus};
use crate::errors::ExecutorFailure;
use crate::events::{EventBroadcaster, RunEvent};
use crate::executor::InvokeBudget;
use crate::judge::Candidate;
use crate::router::Router;
use crate::run::CancelFlag;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

/// An ephemeral grouping of sibling stages for one parallel phase.
///
/// The batch exists only until the join completes; afterwards it collapses
/// into the judge's single consuming stage.
#[derive(Debug)]
pub struct FanOutBatch {
    /// Batch id, shared by every sibling record.
    pub id: Uuid,
    /// All sibling records in sibling order, settled.
    pub records: Vec<StageRecord>,
    /// The successful siblings, indexed as the judge must reference them.
    pub candidates: Vec<Candidate>,
}

impl FanOutBatch {
    /// Returns true if at least one sibling succeeded.
    #[must_use]
    pub fn has_candidates(&self) -> bool {
        !self.candidates.is_empty()
    }
}

/// Runs one fan-out batch and joins it.
///
/// Launches `width` sibling sub-tasks, at most `max_parallel` in flight, each
/// under its own timeout. The join barrier waits for every sub-task to finish
/// or time out. If cancellation is requested during the join, in-flight
/// sub-calls are aborted best-effort and the batch settles with whatever
/// finished; the caller observes the cancel flag and stops the pipeline.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_batch(
    run_id: RunId,
    role: StageRole,
    width: usize,
    snapshot: &str,
    router: &Router,
    budget: &InvokeBudget,
    broadcaster: &Arc<EventBroadcaster>,
    cancel: &CancelFlag,
    subtask_timeout: Duration,
    max_parallel: usize,
) -> FanOutBatch {
    let batch_id = Uuid::new_v4();
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut tasks: JoinSet<(usize, StageRecord)> = JoinSet::new();

    for sibling in 0..width {
        let router = router.clone();
        let budget = budget.clone();
        let snapshot = snapshot.to_string();
        let broadcaster = broadcaster.clone();
        let semaphore = semaphore.clone();

        tasks.spawn(async move {
            let mut record = StageRecord::pending(run_id, role).in_batch(batch_id);

            // Bounds how many siblings are in flight at once.
            let Ok(_permit) = semaphore.acquire().await else {
                record.skip("batch aborted before start");
                return (sibling, record);
            };

            let executor = match router.route(role, &budget) {
                Ok(executor) => executor,
                Err(err) => {
                    record.fail(err.to_string());
                    return (sibling, record);
                }
            };

            let executor_id = executor.id().clone();
            if !router.consume_quota(&executor_id) {
                record.fail(
                    ExecutorFailure::rejected(executor_id, "quota exhausted at invoke time")
                        .to_string(),
                );
                return (sibling, record);
            }

            record.begin(executor_id.clone(), snapshot.clone());
            broadcaster.publish(RunEvent::stage_start(&record));

            match tokio::time::timeout(
                subtask_timeout,
                executor.invoke(role, &snapshot, &budget),
            )
            .await
            {
                Ok(Ok(reply)) => {
                    let metrics = reply.metrics();
                    record.complete(reply.text, metrics);
                }
                Ok(Err(failure)) => {
                    record.fail(failure.to_string());
                }
                Err(_) => {
                    record.fail(
                        ExecutorFailure::timeout(
                            executor_id,
                            subtask_timeout.as_millis() as u64,
                        )
                        .to_string(),
                    );
                }
            }

            broadcaster.publish(RunEvent::stage_end(&record));
            (sibling, record)
        });
    }

    let mut settled: Vec<(usize, StageRecord)> = Vec::with_capacity(width);
    let mut aborted = false;

    loop {
        tokio::select! {
            joined = tasks.join_next() => {
                match joined {
                    Some(Ok(outcome)) => settled.push(outcome),
                    Some(Err(join_err)) => {
                        if !join_err.is_cancelled() {
                            warn!(run_id = %run_id, error = %join_err, "fan-out sub-task panicked");
                        }
                    }
                    None => break,
                }
            }
            () = cancel.cancelled(), if !aborted => {
                debug!(run_id = %run_id, "cancellation during join; aborting in-flight siblings");
                aborted = true;
                tasks.abort_all();
            }
        }
    }

    // Siblings whose tasks were aborted never returned a record.
    let mut records: Vec<StageRecord> = Vec::with_capacity(width);
    settled.sort_by_key(|(sibling, _)| *sibling);
    let mut settled_iter = settled.into_iter().peekable();
    for sibling in 0..width {
        if settled_iter.peek().is_some_and(|(s, _)| *s == sibling) {
            if let Some((_, record)) = settled_iter.next() {
                records.push(record);
            }
        } else {
            let mut record = StageRecord::pending(run_id, role).in_batch(batch_id);
            record.fail("aborted by cancellation");
            records.push(record);
        }
    }

    let candidates = records
        .iter()
        .filter(|record| record.status == StageStatus::Done)
        .enumerate()
        .map(|(index, record)| Candidate {
            index,
            stage_id: record.id,
            executor: record
                .executor
                .clone()
                .unwrap_or_else(|| crate::core::ExecutorId::new("unknown")),
            text: record.output.clone().unwrap_or_default(),
        })
        .collect();

    FanOutBatch {
        id: batch_id,
        records,
        candidates,
    }
}
