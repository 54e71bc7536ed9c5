//! Independent third-party review signals.
//!
//! Review signals feed confidence only; they are never a structural
//! dependency of the main stage chain.

mod collector;
mod scorer;

pub use collector::SignalCollector;
pub use scorer::confidence;

use crate::core::{ExecutorId, RunId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The stance a reviewer takes toward the work-in-progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    /// The reviewer endorses the work.
    Agree,
    /// The reviewer disputes the work.
    Disagree,
    /// The reviewer is split, or the reply took no clear stance.
    Mixed,
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agree => write!(f, "agree"),
            Self::Disagree => write!(f, "disagree"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

impl Stance {
    /// Extracts the stance from a reviewer reply.
    ///
    /// The stance is read from the leading word of the reply,
    /// case-insensitively. Replies that take no recognizable stance are
    /// `Mixed` - a malformed reply never counts as agreement or
    /// disagreement.
    #[must_use]
    pub fn parse(reply: &str) -> Self {
        let leading = reply
            .trim_start()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or("");

        match leading.to_ascii_uppercase().as_str() {
            "AGREE" => Self::Agree,
            "DISAGREE" => Self::Disagree,
            _ => Self::Mixed,
        }
    }
}

/// Feedback from one independent reviewer.
///
/// Created by the signal collector; read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSignal {
    /// The run being reviewed.
    pub run_id: RunId,
    /// Which reviewer produced the signal.
    pub reviewer: ExecutorId,
    /// The stance taken.
    pub stance: Stance,
    /// The full feedback text.
    pub feedback: String,
    /// How long the reviewer took, in milliseconds.
    pub latency_ms: u64,
}

impl ReviewSignal {
    /// Creates a signal from a reviewer reply.
    #[must_use]
    pub fn from_reply(
        run_id: RunId,
        reviewer: ExecutorId,
        reply: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        let feedback = reply.into();
        Self {
            run_id,
            reviewer,
            stance: Stance::parse(&feedback),
            feedback,
            latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stances() {
        assert_eq!(Stance::parse("AGREE: solid reasoning"), Stance::Agree);
        assert_eq!(Stance::parse("agree, with reservations"), Stance::Agree);
        assert_eq!(Stance::parse("  Disagree - flawed premise"), Stance::Disagree);
        assert_eq!(Stance::parse("MIXED: parts hold up"), Stance::Mixed);
    }

    #[test]
    fn test_parse_unrecognized_is_mixed() {
        assert_eq!(Stance::parse("I think it's fine"), Stance::Mixed);
        assert_eq!(Stance::parse(""), Stance::Mixed);
        assert_eq!(Stance::parse("AGREEABLE weather"), Stance::Mixed);
    }

    #[test]
    fn test_signal_from_reply() {
        let signal = ReviewSignal::from_reply(
            RunId::new(),
            ExecutorId::new("reviewer-1"),
            "DISAGREE: the second claim is unsupported",
            420,
        );

        assert_eq!(signal.stance, Stance::Disagree);
        assert!(signal.feedback.contains("unsupported"));
        assert_eq!(signal.latency_ms, 420);
    }
}
