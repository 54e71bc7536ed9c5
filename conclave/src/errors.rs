//! Error types for the conclave orchestrator.
//!
//! Stage-local failures are recovered via one fallback attempt; anything
//! beyond that surfaces as a run-level error with the failing stage and
//! reason recorded. Cancellation is a normal terminal path, not a failure.

use crate::core::{ExecutorId, RunId, StageRole};
use thiserror::Error;

/// The main error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum ConclaveError {
    /// Input was rejected before a run was created.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The router found no candidate meeting the constraints.
    #[error("{0}")]
    NoExecutor(#[from] NoExecutorAvailable),

    /// A selected executor failed or timed out.
    #[error("{0}")]
    Executor(#[from] ExecutorFailure),

    /// The judge returned an invalid result or had nothing to judge.
    #[error("{0}")]
    Aggregation(#[from] AggregationError),

    /// An audit write failed beyond its retry budget.
    #[error("{0}")]
    Audit(#[from] AuditError),

    /// The run was cancelled; a normal terminal path.
    #[error("run {run_id} cancelled: {reason}")]
    Cancelled {
        /// The cancelled run.
        run_id: RunId,
        /// The first cancellation reason.
        reason: String,
    },

    /// The run id is not known to the registry.
    #[error("unknown run: {0}")]
    UnknownRun(RunId),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error raised when input is rejected before a run is created.
#[derive(Debug, Clone, Error)]
#[error("invalid input: {message}")]
pub struct ValidationError {
    /// What was wrong with the input.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when the filtered candidate set for a stage is empty.
///
/// No fallback is attempted for this error since none exists.
#[derive(Debug, Clone, Error)]
#[error("no executor available for role '{role}' ({considered} considered)")]
pub struct NoExecutorAvailable {
    /// The role that could not be staffed.
    pub role: StageRole,
    /// How many registered executors were considered.
    pub considered: usize,
}

/// Error raised when a selected executor fails or times out.
#[derive(Debug, Clone, Error)]
pub enum ExecutorFailure {
    /// The call did not complete within its bounded timeout.
    #[error("executor '{executor}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The executor that timed out.
        executor: ExecutorId,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The executor refused the call (quota, policy, malformed request).
    #[error("executor '{executor}' rejected the call: {reason}")]
    Rejected {
        /// The executor that rejected the call.
        executor: ExecutorId,
        /// The rejection reason.
        reason: String,
    },

    /// The call failed in transit.
    #[error("executor '{executor}' transport error: {reason}")]
    Transport {
        /// The executor whose call failed.
        executor: ExecutorId,
        /// The failure reason.
        reason: String,
    },
}

impl ExecutorFailure {
    /// Creates a timeout failure.
    #[must_use]
    pub fn timeout(executor: ExecutorId, timeout_ms: u64) -> Self {
        Self::Timeout {
            executor,
            timeout_ms,
        }
    }

    /// Creates a rejection failure.
    #[must_use]
    pub fn rejected(executor: ExecutorId, reason: impl Into<String>) -> Self {
        Self::Rejected {
            executor,
            reason: reason.into(),
        }
    }

    /// Creates a transport failure.
    #[must_use]
    pub fn transport(executor: ExecutorId, reason: impl Into<String>) -> Self {
        Self::Transport {
            executor,
            reason: reason.into(),
        }
    }

    /// Returns the executor the failure is attributed to.
    #[must_use]
    pub fn executor(&self) -> &ExecutorId {
        match self {
            Self::Timeout { executor, .. }
            | Self::Rejected { executor, .. }
            | Self::Transport { executor, .. } => executor,
        }
    }
}

/// Error raised when a fan-out batch cannot be resolved into a verdict.
#[derive(Debug, Clone, Error)]
pub enum AggregationError {
    /// Every sibling in the batch failed; there is nothing to judge.
    #[error("no successful candidates to judge")]
    NoCandidates,

    /// The judge selected an index outside the successful candidate set.
    #[error("judge selected candidate {selected} but only {candidates} succeeded")]
    IndexOutOfRange {
        /// The index the judge returned.
        selected: usize,
        /// The number of successful candidates.
        candidates: usize,
    },

    /// The judge's reply could not be parsed into a verdict.
    #[error("judge reply could not be parsed: {reason}")]
    Unparseable {
        /// Why parsing failed.
        reason: String,
    },
}

/// Error raised by the audit persistence collaborator.
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    /// The store could not accept the write.
    #[error("audit store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected a write that violates the audit contract.
    #[error("audit write rejected: {0}")]
    Rejected(String),

    /// Retries were exhausted without a successful write.
    #[error("audit write failed after {attempts} attempts")]
    Exhausted {
        /// How many attempts were made.
        attempts: usize,
    },
}
