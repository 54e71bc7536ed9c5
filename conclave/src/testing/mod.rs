//! Test doubles for executors and recorders.
//!
//! These mocks are used by the crate's own tests and are exported for
//! downstream integration testing against the orchestrator.

mod mocks;

pub use mocks::{
    verdict_json, FailingExecutor, FlakyAuditRecorder, ScriptedExecutor, SlowExecutor,
};
