//! # Conclave
//!
//! A fixed-pipeline deliberation orchestrator over interchangeable model
//! executors.
//!
//! Conclave drives multi-stage reasoning runs: a fixed plan of roles walks
//! from analysis through drafting fan-outs to a judged verdict and a final
//! synthesis, with:
//!
//! - **Dynamic executor selection**: every stage is routed through a pure,
//!   capability-filtered selection function; no role is ever hard-bound to a
//!   provider
//! - **Parallel fan-out and aggregation**: bounded sibling batches under a
//!   join barrier, collapsed into a single verdict by a routed judge
//! - **Review-confidence scoring**: optional third-party review signals
//!   folded into a tri-level confidence, without blocking the main chain
//! - **Session lifecycle**: a run registry with cooperative cancellation,
//!   push event subscriptions and an idempotent polling fallback
//! - **Write-before-advance auditing**: every stage transition is persisted
//!   before the next stage starts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conclave::prelude::*;
//! use std::sync::Arc;
//!
//! let executors = Arc::new(ExecutorRegistry::new());
//! executors.register(my_provider)?;
//!
//! let orchestrator = Orchestrator::builder()
//!     .executors(executors)
//!     .build();
//!
//! let run_id = orchestrator.start_run(
//!     "Summarize X",
//!     RunOptions::new(StagePlan::deliberation(3)),
//! )?;
//!
//! let mut events = orchestrator.subscribe(run_id)?;
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod audit;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod judge;
pub mod observability;
pub mod orchestrator;
pub mod pipeline;
pub mod review;
pub mod router;
pub mod run;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditRecorder, InMemoryAuditRecorder, RetryingRecorder};
    pub use crate::config::{OrchestratorConfig, RetryConfig};
    pub use crate::core::{
        ConfidenceLevel, ExecutorId, RunId, RunStatus, StageMetrics, StageRecord, StageRole,
        StageStatus,
    };
    pub use crate::errors::{
        AggregationError, AuditError, ConclaveError, ExecutorFailure, NoExecutorAvailable,
        ValidationError,
    };
    pub use crate::events::{
        EventBroadcaster, EventSink, LoggingEventSink, NoOpEventSink, RunEvent, RunEventKind,
    };
    pub use crate::executor::{
        Capability, Executor, ExecutorProfile, ExecutorRegistry, ExecutorReply, InvokeBudget,
        QuotaPool,
    };
    pub use crate::judge::{Aggregator, Candidate, Verdict};
    pub use crate::orchestrator::{Orchestrator, OrchestratorBuilder};
    pub use crate::pipeline::{PlanStep, RunOptions, StagePlan, StepMode};
    pub use crate::review::{ReviewSignal, SignalCollector, Stance};
    pub use crate::router::Router;
    pub use crate::run::{RunRegistry, RunSnapshot};
    pub use crate::utils::{iso_timestamp, now_utc, Timestamp};
}
