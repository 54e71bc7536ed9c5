//! Per-stage executor selection.
//!
//! Selection is a pure function over a registry snapshot and a quota view,
//! re-evaluated for every stage of every run. No role is ever permanently
//! bound to an executor, and no prior run's choice is cached.

use crate::core::{ExecutorId, StageRole};
use crate::errors::NoExecutorAvailable;
use crate::executor::{
    Capability, Executor, ExecutorProfile, ExecutorRegistry, InvokeBudget, QuotaPool, QuotaView,
};
use std::cmp::Ordering;
use std::sync::Arc;

/// Capability a role requires of its executor.
#[must_use]
pub fn required_capability(role: StageRole) -> Capability {
    match role {
        StageRole::Analyst => Capability::Analysis,
        StageRole::Researcher => Capability::Research,
        StageRole::Creator => Capability::Drafting,
        StageRole::Critic => Capability::Critique,
        StageRole::Council => Capability::Judging,
        StageRole::Synthesizer => Capability::Synthesis,
        StageRole::Specialist => Capability::Analysis,
        StageRole::Reviewer => Capability::Review,
    }
}

/// Selects one executor for a stage.
///
/// Filters the candidate set by capability, available quota and budget
/// ceilings, then orders by `(cost, latency)`. The sort is stable, so ties
/// resolve by registration order. `exclude` removes one executor from
/// consideration (the fallback path).
///
/// # Errors
///
/// Returns [`NoExecutorAvailable`] when the filtered set is empty.
pub fn select(
    role: StageRole,
    budget: &InvokeBudget,
    profiles: &[ExecutorProfile],
    quota: &QuotaView,
    exclude: Option<&ExecutorId>,
) -> Result<ExecutorId, NoExecutorAvailable> {
    let required = required_capability(role);

    let mut candidates: Vec<&ExecutorProfile> = profiles
        .iter()
        .filter(|p| exclude.map_or(true, |id| &p.id != id))
        .filter(|p| p.has_capability(required))
        .filter(|p| quota.has_quota(&p.id))
        .filter(|p| budget.max_cost.map_or(true, |max| p.cost_per_call <= max))
        .filter(|p| {
            budget
                .max_latency_ms
                .map_or(true, |max| p.expected_latency_ms <= max)
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.cost_per_call
            .partial_cmp(&b.cost_per_call)
            .unwrap_or(Ordering::Equal)
            .then(a.expected_latency_ms.cmp(&b.expected_latency_ms))
    });

    candidates
        .first()
        .map(|p| p.id.clone())
        .ok_or(NoExecutorAvailable {
            role,
            considered: profiles.len(),
        })
}

/// Stateful wrapper binding the pure selection to a live registry and pool.
#[derive(Debug, Clone)]
pub struct Router {
    executors: Arc<ExecutorRegistry>,
    quota: Arc<QuotaPool>,
}

impl Router {
    /// Creates a router over a registry and quota pool.
    #[must_use]
    pub fn new(executors: Arc<ExecutorRegistry>, quota: Arc<QuotaPool>) -> Self {
        Self { executors, quota }
    }

    /// Routes one stage to an executor.
    ///
    /// # Errors
    ///
    /// Returns [`NoExecutorAvailable`] when no candidate meets the
    /// constraints.
    pub fn route(
        &self,
        role: StageRole,
        budget: &InvokeBudget,
    ) -> Result<Arc<dyn Executor>, NoExecutorAvailable> {
        self.route_excluding(role, budget, None)
    }

    /// Routes one stage to an executor distinct from `exclude`.
    ///
    /// Used for the single fallback attempt after an executor failure.
    ///
    /// # Errors
    ///
    /// Returns [`NoExecutorAvailable`] when no distinct candidate exists.
    pub fn route_excluding(
        &self,
        role: StageRole,
        budget: &InvokeBudget,
        exclude: Option<&ExecutorId>,
    ) -> Result<Arc<dyn Executor>, NoExecutorAvailable> {
        let snapshot = self.executors.snapshot();
        let quota = self.quota.view();
        let id = select(role, budget, &snapshot.profiles, &quota, exclude)?;

        // The registry only grows, so a just-selected id resolves.
        self.executors.get(&id).ok_or(NoExecutorAvailable {
            role,
            considered: snapshot.profiles.len(),
        })
    }

    /// Consumes one unit of quota for an executor about to be invoked.
    #[must_use]
    pub fn consume_quota(&self, id: &ExecutorId) -> bool {
        self.quota.try_consume(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;

    fn profiles() -> Vec<ExecutorProfile> {
        vec![
            ExecutorProfile::new("pricey")
                .with_capability(Capability::Drafting)
                .with_cost(5.0)
                .with_latency_ms(200),
            ExecutorProfile::new("cheap-slow")
                .with_capability(Capability::Drafting)
                .with_cost(1.0)
                .with_latency_ms(900),
            ExecutorProfile::new("cheap-fast")
                .with_capability(Capability::Drafting)
                .with_cost(1.0)
                .with_latency_ms(300),
            ExecutorProfile::new("critic-only")
                .with_capability(Capability::Critique)
                .with_cost(0.1)
                .with_latency_ms(100),
        ]
    }

    #[test]
    fn test_select_orders_by_cost_then_latency() {
        let selected = select(
            StageRole::Creator,
            &InvokeBudget::unlimited(),
            &profiles(),
            &QuotaView::default(),
            None,
        )
        .unwrap();

        assert_eq!(selected.as_str(), "cheap-fast");
    }

    #[test]
    fn test_select_filters_capability() {
        let selected = select(
            StageRole::Critic,
            &InvokeBudget::unlimited(),
            &profiles(),
            &QuotaView::default(),
            None,
        )
        .unwrap();

        assert_eq!(selected.as_str(), "critic-only");
    }

    #[test]
    fn test_select_respects_budget() {
        // Latency ceiling excludes both cheap drafting executors except the
        // fast one; cost ceiling then excludes the pricey one.
        let budget = InvokeBudget::unlimited()
            .with_max_cost(2.0)
            .with_max_latency_ms(500);

        let selected = select(
            StageRole::Creator,
            &budget,
            &profiles(),
            &QuotaView::default(),
            None,
        )
        .unwrap();

        assert_eq!(selected.as_str(), "cheap-fast");
    }

    #[test]
    fn test_select_exclude_enables_fallback() {
        let exclude = ExecutorId::new("cheap-fast");
        let selected = select(
            StageRole::Creator,
            &InvokeBudget::unlimited(),
            &profiles(),
            &QuotaView::default(),
            Some(&exclude),
        )
        .unwrap();

        assert_eq!(selected.as_str(), "cheap-slow");
    }

    #[test]
    fn test_select_empty_set_is_error() {
        let err = select(
            StageRole::Council,
            &InvokeBudget::unlimited(),
            &profiles(),
            &QuotaView::default(),
            None,
        )
        .unwrap_err();

        assert_eq!(err.role, StageRole::Council);
        assert_eq!(err.considered, 4);
    }

    #[test]
    fn test_select_ties_break_by_registration_order() {
        let tied = vec![
            ExecutorProfile::new("registered-first")
                .with_capability(Capability::Synthesis)
                .with_cost(1.0)
                .with_latency_ms(100),
            ExecutorProfile::new("registered-second")
                .with_capability(Capability::Synthesis)
                .with_cost(1.0)
                .with_latency_ms(100),
        ];

        let selected = select(
            StageRole::Synthesizer,
            &InvokeBudget::unlimited(),
            &tied,
            &QuotaView::default(),
            None,
        )
        .unwrap();

        assert_eq!(selected.as_str(), "registered-first");
    }

    #[test]
    fn test_select_skips_exhausted_quota() {
        let pool = QuotaPool::new();
        pool.set_limit(ExecutorId::new("cheap-fast"), 0);

        let selected = select(
            StageRole::Creator,
            &InvokeBudget::unlimited(),
            &profiles(),
            &pool.view(),
            None,
        )
        .unwrap();

        assert_eq!(selected.as_str(), "cheap-slow");
    }

    #[tokio::test]
    async fn test_router_routes_to_live_executor() {
        let registry = Arc::new(ExecutorRegistry::new());
        registry
            .register(Arc::new(ScriptedExecutor::new(
                "only",
                &[Capability::Analysis],
                &["report"],
            )))
            .unwrap();

        let router = Router::new(registry, Arc::new(QuotaPool::new()));
        let executor = router
            .route(StageRole::Analyst, &InvokeBudget::unlimited())
            .unwrap();

        assert_eq!(executor.id().as_str(), "only");
    }
}
