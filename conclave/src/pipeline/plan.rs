//! Fixed stage plans.
//!
//! Pipelines are built from a small, closed set of plan shapes; there are no
//! user-defined DAGs. Construction validates the shape once so the driver
//! can walk it without re-checking.

use crate::core::StageRole;
use crate::errors::ValidationError;
use crate::utils::validate_fanout_width;
use serde::{Deserialize, Serialize};

/// How one plan step executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum StepMode {
    /// One routed executor call consuming the accumulated context.
    Solo,
    /// A bounded-parallel batch of sibling calls under a join barrier.
    FanOut {
        /// Number of siblings.
        width: usize,
    },
    /// A routed judge call consuming the preceding fan-out batch.
    Judge,
}

/// One step of a fixed pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// The role the step is bound to.
    pub role: StageRole,
    /// How the step executes.
    pub mode: StepMode,
}

impl PlanStep {
    /// Creates a solo step.
    #[must_use]
    pub fn solo(role: StageRole) -> Self {
        Self {
            role,
            mode: StepMode::Solo,
        }
    }

    /// Creates a fan-out step.
    #[must_use]
    pub fn fan_out(role: StageRole, width: usize) -> Self {
        Self {
            role,
            mode: StepMode::FanOut { width },
        }
    }

    /// Creates a judge step.
    #[must_use]
    pub fn judge(role: StageRole) -> Self {
        Self {
            role,
            mode: StepMode::Judge,
        }
    }
}

/// A fixed, validated sequence of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagePlan {
    name: String,
    steps: Vec<PlanStep>,
    review_after: Option<usize>,
}

impl StagePlan {
    /// Builds a plan from steps, validating its shape.
    ///
    /// A valid plan is non-empty, has at most one fan-out and at most one
    /// judge step (a run carries at most one verdict), pairs them - the
    /// judge consumes the batch, so neither appears without the other - and
    /// has a fan-out width of at least one.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first violated rule.
    pub fn new(name: impl Into<String>, steps: Vec<PlanStep>) -> Result<Self, ValidationError> {
        if steps.is_empty() {
            return Err(ValidationError::new("a plan needs at least one step"));
        }

        let mut fan_out_count = 0usize;
        let mut judge_count = 0usize;
        for step in &steps {
            match step.mode {
                StepMode::FanOut { width } => {
                    validate_fanout_width(width)?;
                    fan_out_count += 1;
                    if fan_out_count > 1 {
                        return Err(ValidationError::new(
                            "a plan may contain at most one fan-out step",
                        ));
                    }
                }
                StepMode::Judge => {
                    judge_count += 1;
                    if judge_count > 1 {
                        return Err(ValidationError::new(
                            "a plan may contain at most one judge step",
                        ));
                    }
                    if fan_out_count == 0 {
                        return Err(ValidationError::new(
                            "a judge step must be preceded by a fan-out step",
                        ));
                    }
                }
                StepMode::Solo => {}
            }
        }
        if fan_out_count > 0 && judge_count == 0 {
            return Err(ValidationError::new(
                "a fan-out step requires a judge step to consume its batch",
            ));
        }

        let review_after = default_review_trigger(&steps);
        Ok(Self {
            name: name.into(),
            steps,
            review_after,
        })
    }

    /// The six-role deliberation pipeline: analysis, research, a drafting
    /// fan-out, the judged verdict, critique, synthesis.
    #[must_use]
    pub fn deliberation(draft_width: usize) -> Self {
        Self::new(
            "deliberation",
            vec![
                PlanStep::solo(StageRole::Analyst),
                PlanStep::solo(StageRole::Researcher),
                PlanStep::fan_out(StageRole::Creator, draft_width.max(1)),
                PlanStep::judge(StageRole::Council),
                PlanStep::solo(StageRole::Critic),
                PlanStep::solo(StageRole::Synthesizer),
            ],
        )
        .unwrap_or_else(|_| unreachable!("deliberation plan shape is fixed"))
    }

    /// The specialist-council variant: framing, a five-wide specialist
    /// fan-out, the judged verdict, synthesis.
    #[must_use]
    pub fn specialist_council() -> Self {
        Self::new(
            "specialist_council",
            vec![
                PlanStep::solo(StageRole::Analyst),
                PlanStep::fan_out(StageRole::Specialist, 5),
                PlanStep::judge(StageRole::Council),
                PlanStep::solo(StageRole::Synthesizer),
            ],
        )
        .unwrap_or_else(|_| unreachable!("specialist council plan shape is fixed"))
    }

    /// A plain sequential chain over the given roles.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when `roles` is empty.
    pub fn chain(name: impl Into<String>, roles: &[StageRole]) -> Result<Self, ValidationError> {
        Self::new(name, roles.iter().copied().map(PlanStep::solo).collect())
    }

    /// Overrides the step index after which reviews launch.
    #[must_use]
    pub fn with_review_after(mut self, step_index: usize) -> Self {
        self.review_after = Some(step_index.min(self.steps.len().saturating_sub(1)));
        self
    }

    /// The plan's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plan's steps, in execution order.
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; construction rejects empty plans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step index after which the review collector launches, if any.
    #[must_use]
    pub fn review_after(&self) -> Option<usize> {
        self.review_after
    }
}

/// Reviews launch once enough context exists to summarize the
/// work-in-progress: after the first fan-out join when the plan has one,
/// otherwise after the midpoint stage.
fn default_review_trigger(steps: &[PlanStep]) -> Option<usize> {
    if let Some(idx) = steps
        .iter()
        .position(|s| matches!(s.mode, StepMode::FanOut { .. }))
    {
        return Some(idx);
    }
    if steps.len() > 1 {
        return Some(steps.len() / 2);
    }
    None
}
