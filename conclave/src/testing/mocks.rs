//! Mock executors and audit recorders.

use crate::audit::{AuditRecorder, InMemoryAuditRecorder};
use crate::core::{RunId, StageRecord, StageRole};
use crate::errors::{AuditError, ExecutorFailure};
use crate::executor::{Capability, Executor, ExecutorProfile, ExecutorReply, InvokeBudget};
use crate::judge::Verdict;
use crate::review::ReviewSignal;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Builds the JSON reply a well-behaved judge executor returns.
#[must_use]
pub fn verdict_json(selected: usize) -> String {
    format!(
        r#"{{"selected": {selected}, "keep": ["structure"], "fix": ["tighten wording"], "speculative": []}}"#
    )
}

/// An executor that returns scripted replies in call order.
///
/// Each call consumes the next scripted entry; calls past the end repeat the
/// last entry. Individual entries can be delayed to simulate slow calls.
#[derive(Debug)]
pub struct ScriptedExecutor {
    profile: ExecutorProfile,
    replies: Vec<String>,
    delays: HashMap<usize, Duration>,
    calls: Mutex<usize>,
}

impl ScriptedExecutor {
    /// Creates a scripted executor with the given capabilities and replies.
    #[must_use]
    pub fn new(name: &str, capabilities: &[Capability], replies: &[&str]) -> Self {
        Self {
            profile: ExecutorProfile::new(name).with_capabilities(capabilities),
            replies: replies.iter().map(|r| (*r).to_string()).collect(),
            delays: HashMap::new(),
            calls: Mutex::new(0),
        }
    }

    /// Sets the profile's nominal cost.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.profile = self.profile.with_cost(cost);
        self
    }

    /// Sets the profile's expected latency.
    #[must_use]
    pub fn with_latency_ms(mut self, latency: u64) -> Self {
        self.profile = self.profile.with_latency_ms(latency);
        self
    }

    /// Delays the call with the given index (0-based, call order).
    #[must_use]
    pub fn with_delay_at(mut self, call_index: usize, delay: Duration) -> Self {
        self.delays.insert(call_index, delay);
        self
    }

    /// Returns how many times the executor was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn profile(&self) -> &ExecutorProfile {
        &self.profile
    }

    async fn invoke(
        &self,
        _role: StageRole,
        _context: &str,
        _budget: &InvokeBudget,
    ) -> Result<ExecutorReply, ExecutorFailure> {
        let call_index = {
            let mut calls = self.calls.lock();
            let index = *calls;
            *calls += 1;
            index
        };

        if let Some(delay) = self.delays.get(&call_index) {
            tokio::time::sleep(*delay).await;
        }

        let Some(text) = self
            .replies
            .get(call_index.min(self.replies.len().saturating_sub(1)))
        else {
            return Err(ExecutorFailure::transport(
                self.profile.id.clone(),
                "script is empty",
            ));
        };

        Ok(ExecutorReply {
            text: text.clone(),
            tokens_in: 10,
            tokens_out: 5,
            latency_ms: 1,
        })
    }
}

/// An executor that always fails with a transport error.
#[derive(Debug)]
pub struct FailingExecutor {
    profile: ExecutorProfile,
    reason: String,
    calls: Mutex<usize>,
}

impl FailingExecutor {
    /// Creates a failing executor.
    #[must_use]
    pub fn new(name: &str, capabilities: &[Capability], reason: &str) -> Self {
        Self {
            profile: ExecutorProfile::new(name).with_capabilities(capabilities),
            reason: reason.to_string(),
            calls: Mutex::new(0),
        }
    }

    /// Sets the profile's nominal cost.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.profile = self.profile.with_cost(cost);
        self
    }

    /// Returns how many times the executor was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Executor for FailingExecutor {
    fn profile(&self) -> &ExecutorProfile {
        &self.profile
    }

    async fn invoke(
        &self,
        _role: StageRole,
        _context: &str,
        _budget: &InvokeBudget,
    ) -> Result<ExecutorReply, ExecutorFailure> {
        *self.calls.lock() += 1;
        Err(ExecutorFailure::transport(
            self.profile.id.clone(),
            self.reason.clone(),
        ))
    }
}

/// An executor that sleeps before replying, for timeout tests.
#[derive(Debug)]
pub struct SlowExecutor {
    profile: ExecutorProfile,
    delay: Duration,
}

impl SlowExecutor {
    /// Creates a slow executor.
    #[must_use]
    pub fn new(name: &str, capabilities: &[Capability], delay: Duration) -> Self {
        Self {
            profile: ExecutorProfile::new(name).with_capabilities(capabilities),
            delay,
        }
    }

    /// Sets the profile's nominal cost.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.profile = self.profile.with_cost(cost);
        self
    }
}

#[async_trait]
impl Executor for SlowExecutor {
    fn profile(&self) -> &ExecutorProfile {
        &self.profile
    }

    async fn invoke(
        &self,
        _role: StageRole,
        _context: &str,
        _budget: &InvokeBudget,
    ) -> Result<ExecutorReply, ExecutorFailure> {
        tokio::time::sleep(self.delay).await;
        Ok(ExecutorReply::new("late reply"))
    }
}

/// An audit recorder whose first N writes fail, then delegates.
///
/// With a large enough failure budget it models a store that is down for
/// good, which is how the degraded path is exercised.
#[derive(Debug, Default)]
pub struct FlakyAuditRecorder {
    remaining_failures: AtomicUsize,
    inner: InMemoryAuditRecorder,
}

impl FlakyAuditRecorder {
    /// Creates a recorder that fails the first `failures` writes.
    #[must_use]
    pub fn failing(failures: usize) -> Self {
        Self {
            remaining_failures: AtomicUsize::new(failures),
            inner: InMemoryAuditRecorder::new(),
        }
    }

    fn try_write(&self) -> Result<(), AuditError> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(AuditError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditRecorder for FlakyAuditRecorder {
    async fn append_stage(&self, record: StageRecord) -> Result<(), AuditError> {
        self.try_write()?;
        self.inner.append_stage(record).await
    }

    async fn append_review(&self, signal: ReviewSignal) -> Result<(), AuditError> {
        self.try_write()?;
        self.inner.append_review(signal).await
    }

    async fn append_verdict(&self, run_id: RunId, verdict: Verdict) -> Result<(), AuditError> {
        self.try_write()?;
        self.inner.append_verdict(run_id, verdict).await
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
