//! Verdict aggregation over a fan-out batch.
//!
//! The judge is itself a routed executor call; this module composes the
//! brief it receives and validates the structure it returns.

use crate::core::{ConfidenceLevel, ExecutorId};
use crate::errors::AggregationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One successful fan-out sibling presented to the judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Position within the successful set, as presented to the judge.
    pub index: usize,
    /// The sibling stage that produced this candidate.
    pub stage_id: Uuid,
    /// The executor that produced it.
    pub executor: ExecutorId,
    /// The candidate text.
    pub text: String,
}

/// The structured output of a judge stage.
///
/// Immutable once written; at most one verdict exists per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Index of the selected candidate within the successful set.
    pub selected: usize,
    /// Points worth keeping across candidates.
    #[serde(default)]
    pub keep: Vec<String>,
    /// Issues the synthesis stage should fix.
    #[serde(default)]
    pub fix: Vec<String>,
    /// Claims flagged as speculative.
    #[serde(default)]
    pub speculative: Vec<String>,
    /// The judge's own confidence hint.
    #[serde(default)]
    pub confidence: Option<ConfidenceLevel>,
}

/// Composes judge briefs and resolves judge replies into verdicts.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator;

impl Aggregator {
    /// Builds the context the judge executor receives: all prior non-fan-out
    /// output followed by every successful candidate, numbered as the
    /// verdict must reference them.
    #[must_use]
    pub fn compose_brief(prior_context: &str, candidates: &[Candidate]) -> String {
        let mut brief = String::with_capacity(
            prior_context.len() + candidates.iter().map(|c| c.text.len() + 32).sum::<usize>(),
        );
        brief.push_str(prior_context);
        brief.push_str("\n\n## Candidates\n");
        for candidate in candidates {
            brief.push_str(&format!(
                "\n### Candidate {}\n{}\n",
                candidate.index, candidate.text
            ));
        }
        brief
    }

    /// Parses and validates a judge reply against the successful candidate
    /// set.
    ///
    /// The reply may wrap its JSON object in prose; everything outside the
    /// outermost braces is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationError::NoCandidates`] when there is nothing to
    /// judge, [`AggregationError::Unparseable`] for a reply without a valid
    /// verdict object, and [`AggregationError::IndexOutOfRange`] when the
    /// selected index does not reference a successful candidate.
    pub fn resolve(reply: &str, candidate_count: usize) -> Result<Verdict, AggregationError> {
        if candidate_count == 0 {
            return Err(AggregationError::NoCandidates);
        }

        let open = reply.find('{');
        let close = reply.rfind('}');
        let json = match (open, close) {
            (Some(open), Some(close)) if close > open => &reply[open..=close],
            _ => {
                return Err(AggregationError::Unparseable {
                    reason: "no JSON object in reply".to_string(),
                })
            }
        };

        let verdict: Verdict =
            serde_json::from_str(json).map_err(|e| AggregationError::Unparseable {
                reason: e.to_string(),
            })?;

        if verdict.selected >= candidate_count {
            return Err(AggregationError::IndexOutOfRange {
                selected: verdict.selected,
                candidates: candidate_count,
            });
        }

        Ok(verdict)
    }

    /// Formats a resolved verdict (and its selected candidate) as context
    /// for the synthesis stage.
    #[must_use]
    pub fn verdict_context(verdict: &Verdict, candidates: &[Candidate]) -> String {
        let selected_text = candidates
            .get(verdict.selected)
            .map_or("", |c| c.text.as_str());

        let mut context = format!(
            "## Selected candidate ({})\n{selected_text}\n",
            verdict.selected
        );
        if !verdict.keep.is_empty() {
            context.push_str("\n## Keep\n");
            for point in &verdict.keep {
                context.push_str(&format!("- {point}\n"));
            }
        }
        if !verdict.fix.is_empty() {
            context.push_str("\n## Fix\n");
            for issue in &verdict.fix {
                context.push_str(&format!("- {issue}\n"));
            }
        }
        if !verdict.speculative.is_empty() {
            context.push_str("\n## Speculative\n");
            for claim in &verdict.speculative {
                context.push_str(&format!("- {claim}\n"));
            }
        }
        context
    }
}
