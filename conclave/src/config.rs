//! Orchestrator configuration.
//!
//! Every timeout, width and attempt bound the driver consults comes from
//! here; nothing is hard-coded at a call site.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry behavior for audit writes: exponential backoff with full jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts (including the initial one).
    pub max_attempts: usize,
    /// Base delay between attempts in milliseconds.
    pub base_delay_ms: u64,
    /// Delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Creates a retry config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Calculates the jittered delay before retry number `attempt`
    /// (0-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt as u32))
            .min(self.max_delay_ms);
        let jittered = if exp == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=exp)
        };
        Duration::from_millis(jittered)
    }
}

/// Tunable limits and timeouts for a single orchestrator instance.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Timeout for one solo-stage executor call.
    pub stage_timeout: Duration,
    /// Timeout for each fan-out sibling call.
    pub subtask_timeout: Duration,
    /// Concurrency bound for fan-out batches.
    pub max_parallel: usize,
    /// Fallback attempts permitted per solo stage.
    pub fallback_attempts: u32,
    /// Timeout for each reviewer call.
    pub reviewer_timeout: Duration,
    /// Total review collection window.
    pub review_window: Duration,
    /// Depth of each run's push event channel.
    pub event_capacity: usize,
    /// Maximum accepted run input length in bytes.
    pub max_input_len: usize,
    /// Retry policy for audit writes.
    pub audit_retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(30),
            subtask_timeout: Duration::from_secs(20),
            max_parallel: 4,
            fallback_attempts: 1,
            reviewer_timeout: Duration::from_secs(10),
            review_window: Duration::from_secs(30),
            event_capacity: 256,
            max_input_len: 64 * 1024,
            audit_retry: RetryConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the solo-stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Sets the fan-out sibling timeout.
    #[must_use]
    pub fn with_subtask_timeout(mut self, timeout: Duration) -> Self {
        self.subtask_timeout = timeout;
        self
    }

    /// Sets the fan-out concurrency bound.
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Sets the permitted fallback attempts per solo stage.
    #[must_use]
    pub fn with_fallback_attempts(mut self, attempts: u32) -> Self {
        self.fallback_attempts = attempts;
        self
    }

    /// Sets the per-reviewer timeout.
    #[must_use]
    pub fn with_reviewer_timeout(mut self, timeout: Duration) -> Self {
        self.reviewer_timeout = timeout;
        self
    }

    /// Sets the review collection window.
    #[must_use]
    pub fn with_review_window(mut self, window: Duration) -> Self {
        self.review_window = window;
        self
    }

    /// Sets the push event channel depth.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Sets the maximum accepted input length.
    #[must_use]
    pub fn with_max_input_len(mut self, len: usize) -> Self {
        self.max_input_len = len;
        self
    }

    /// Sets the audit retry policy.
    #[must_use]
    pub fn with_audit_retry(mut self, retry: RetryConfig) -> Self {
        self.audit_retry = retry;
        self
    }
}
