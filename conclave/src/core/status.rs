//! Run status, stage status and stage role enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle status of a run.
///
/// Transitions are forward-only: `pending → running → terminal`, where
/// terminal is one of `success`, `error`, `cancelled` or `degraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is created but the driver has not started it.
    Pending,
    /// Run is being driven through its stages.
    Running,
    /// Run finished with a final output.
    Success,
    /// Run failed; the failing stage and reason are recorded.
    Error,
    /// Run was cancelled cooperatively.
    Cancelled,
    /// Run produced an output but the audit trail is incomplete.
    Degraded,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status is terminal. Terminal statuses never
    /// change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Error | Self::Cancelled | Self::Degraded
        )
    }

    /// Returns true if `next` is a legal successor of `self`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

/// The execution status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage is created but not yet started.
    Pending,
    /// Stage is executing.
    Running,
    /// Stage finished successfully; its output is visible downstream.
    Done,
    /// Stage failed (executor failure, timeout or aggregation error).
    Error,
    /// Stage was never attempted.
    Skipped,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Skipped)
    }

    /// Returns true if the stage produced a usable output.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// The role a stage (or an out-of-band reviewer call) is bound to.
///
/// Roles form a fixed, closed set; pipelines are built from these and never
/// from user-defined stage kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    /// Breaks the input down and frames the problem.
    Analyst,
    /// Gathers supporting material.
    Researcher,
    /// Produces a candidate draft (fan-out sibling in the drafting phase).
    Creator,
    /// Critiques the selected candidate.
    Critic,
    /// Judges a fan-out batch and produces the verdict.
    Council,
    /// Folds everything into the final output.
    Synthesizer,
    /// Produces a specialist report (fan-out sibling in the council variant).
    Specialist,
    /// Independent third-party reviewer. Never appears in a stage plan.
    Reviewer,
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyst => write!(f, "analyst"),
            Self::Researcher => write!(f, "researcher"),
            Self::Creator => write!(f, "creator"),
            Self::Critic => write!(f, "critic"),
            Self::Council => write!(f, "council"),
            Self::Synthesizer => write!(f, "synthesizer"),
            Self::Specialist => write!(f, "specialist"),
            Self::Reviewer => write!(f, "reviewer"),
        }
    }
}
