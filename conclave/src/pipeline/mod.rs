//! Pipeline planning and execution.
//!
//! This module provides:
//! - Fixed stage plans with validated shapes
//! - The driver walking runs through their plans
//! - Bounded-parallel fan-out batches with a join barrier

mod driver;
mod fanout;
#[cfg(test)]
mod integration_tests;
mod plan;

pub use driver::{PipelineDriver, RunOptions};
pub use fanout::FanOutBatch;
pub use plan::{PlanStep, StagePlan, StepMode};
