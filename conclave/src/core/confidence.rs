//! Tri-level confidence scale.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence in a run's final output, derived from review signals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// No independent agreement.
    Low,
    /// One reviewer agreed.
    Medium,
    /// Two or more reviewers agreed.
    High,
}

impl Default for ConfidenceLevel {
    fn default() -> Self {
        Self::Low
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}
