//! Executor abstraction: the interchangeable unit of delegated work.
//!
//! An executor is a capability-tagged provider that, given a role and
//! accumulated context, returns text output plus token/latency metadata, or
//! fails. Providers are never compared by name in business logic; the router
//! selects them through their typed profiles.

mod quota;
mod registry;

pub use quota::{QuotaPool, QuotaView};
pub use registry::{ExecutorRegistry, RegistrySnapshot};

use crate::core::{ExecutorId, StageMetrics, StageRole};
use crate::errors::ExecutorFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Capability tags an executor declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Problem framing and decomposition.
    Analysis,
    /// Gathering supporting material.
    Research,
    /// Producing candidate drafts.
    Drafting,
    /// Critiquing a candidate.
    Critique,
    /// Judging a set of candidates.
    Judging,
    /// Folding context into a final output.
    Synthesis,
    /// Independent third-party review.
    Review,
}

/// Cost and latency ceilings for one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvokeBudget {
    /// Per-call cost ceiling, in the registry's cost units.
    pub max_cost: Option<f64>,
    /// Expected-latency ceiling in milliseconds.
    pub max_latency_ms: Option<u64>,
    /// Token ceiling hint passed through to the executor.
    pub max_tokens: Option<u32>,
}

impl InvokeBudget {
    /// Creates an unconstrained budget.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Sets the per-call cost ceiling.
    #[must_use]
    pub fn with_max_cost(mut self, cost: f64) -> Self {
        self.max_cost = Some(cost);
        self
    }

    /// Sets the expected-latency ceiling.
    #[must_use]
    pub fn with_max_latency_ms(mut self, latency: u64) -> Self {
        self.max_latency_ms = Some(latency);
        self
    }

    /// Sets the token ceiling hint.
    #[must_use]
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// Static description of an executor, consulted by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorProfile {
    /// Stable identity.
    pub id: ExecutorId,
    /// Declared capabilities.
    pub capabilities: Vec<Capability>,
    /// Nominal cost of one call, in arbitrary but consistent units.
    pub cost_per_call: f64,
    /// Expected latency of one call in milliseconds.
    pub expected_latency_ms: u64,
}

impl ExecutorProfile {
    /// Creates a profile with no capabilities, unit cost and 1s latency.
    #[must_use]
    pub fn new(id: impl Into<ExecutorId>) -> Self {
        Self {
            id: id.into(),
            capabilities: Vec::new(),
            cost_per_call: 1.0,
            expected_latency_ms: 1000,
        }
    }

    /// Adds a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Adds several capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        for capability in capabilities {
            self = self.with_capability(*capability);
        }
        self
    }

    /// Sets the nominal per-call cost.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost_per_call = cost;
        self
    }

    /// Sets the expected latency.
    #[must_use]
    pub fn with_latency_ms(mut self, latency: u64) -> Self {
        self.expected_latency_ms = latency;
        self
    }

    /// Returns true if the profile declares `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Reply from a successful invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorReply {
    /// The text the executor produced.
    pub text: String,
    /// Tokens consumed by the request.
    pub tokens_in: u32,
    /// Tokens produced in the reply.
    pub tokens_out: u32,
    /// Wall-clock latency of the call in milliseconds.
    pub latency_ms: u64,
}

impl ExecutorReply {
    /// Creates a reply with zeroed metadata.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_in: 0,
            tokens_out: 0,
            latency_ms: 0,
        }
    }

    /// Returns total tokens across request and reply.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.tokens_in + self.tokens_out
    }

    /// Extracts the stage metrics from the reply metadata.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics {
            tokens_in: self.tokens_in,
            tokens_out: self.tokens_out,
            latency_ms: self.latency_ms,
        }
    }
}

/// The contract every task executor satisfies.
///
/// Invocations are the only operations in the orchestrator that may block;
/// the driver always bounds them with a timeout.
#[async_trait]
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Static profile consulted by the router.
    fn profile(&self) -> &ExecutorProfile;

    /// Performs one unit of work for `role` over the accumulated `context`.
    async fn invoke(
        &self,
        role: StageRole,
        context: &str,
        budget: &InvokeBudget,
    ) -> Result<ExecutorReply, ExecutorFailure>;

    /// Returns the executor's identity.
    fn id(&self) -> &ExecutorId {
        &self.profile().id
    }
}
