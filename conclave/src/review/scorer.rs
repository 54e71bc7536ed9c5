//! Confidence scoring over a captured review signal set.

use super::{ReviewSignal, Stance};
use crate::core::ConfidenceLevel;

/// Maps a set of review signals to a confidence level.
///
/// Pure: the result depends only on the signal set captured at scoring time.
/// `mixed` and `disagree` stances never increase confidence, and zero
/// signals default to low - no signal is not evidence of agreement.
#[must_use]
pub fn confidence(signals: &[ReviewSignal]) -> ConfidenceLevel {
    let agree_count = signals
        .iter()
        .filter(|signal| signal.stance == Stance::Agree)
        .count();

    match agree_count {
        n if n >= 2 => ConfidenceLevel::High,
        1 => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExecutorId, RunId};

    fn signal(stance: Stance) -> ReviewSignal {
        let reply = match stance {
            Stance::Agree => "AGREE",
            Stance::Disagree => "DISAGREE",
            Stance::Mixed => "MIXED",
        };
        ReviewSignal::from_reply(RunId::new(), ExecutorId::new("reviewer"), reply, 1)
    }

    #[test]
    fn test_confidence_table() {
        let cases: Vec<(Vec<Stance>, ConfidenceLevel)> = vec![
            (vec![Stance::Agree, Stance::Agree], ConfidenceLevel::High),
            (vec![Stance::Agree, Stance::Mixed], ConfidenceLevel::Medium),
            (
                vec![Stance::Disagree, Stance::Disagree, Stance::Disagree],
                ConfidenceLevel::Low,
            ),
            (vec![], ConfidenceLevel::Low),
        ];

        for (stances, expected) in cases {
            let signals: Vec<ReviewSignal> = stances.iter().copied().map(signal).collect();
            assert_eq!(confidence(&signals), expected, "stances: {stances:?}");
        }
    }

    #[test]
    fn test_mixed_and_disagree_never_increase_confidence() {
        let signals = vec![
            signal(Stance::Agree),
            signal(Stance::Mixed),
            signal(Stance::Disagree),
            signal(Stance::Mixed),
        ];
        assert_eq!(confidence(&signals), ConfidenceLevel::Medium);
    }

    #[test]
    fn test_three_agrees_is_still_high() {
        let signals = vec![
            signal(Stance::Agree),
            signal(Stance::Agree),
            signal(Stance::Agree),
        ];
        assert_eq!(confidence(&signals), ConfidenceLevel::High);
    }
}
