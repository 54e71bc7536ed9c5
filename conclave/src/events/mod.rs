//! Run event types and delivery.
//!
//! Both delivery modes (push subscriptions and the poll path through the run
//! registry) observe the same registry state; the broadcaster neither knows
//! nor cares which transport a given client uses.

mod broadcaster;
mod sink;

pub use broadcaster::EventBroadcaster;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::core::{ConfidenceLevel, RunId, RunStatus, StageRecord, StageRole};
use crate::utils::iso_timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of a run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    /// A stage began executing.
    StageStart,
    /// A stage settled (done or error).
    StageEnd,
    /// The run advanced; payload carries completed/total counts.
    Progress,
    /// The run reached a successful (or cancelled) terminal state.
    Complete,
    /// The run failed.
    Error,
}

impl RunEventKind {
    /// Returns true for the event that ends a run's stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for RunEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageStart => write!(f, "stage_start"),
            Self::StageEnd => write!(f, "stage_end"),
            Self::Progress => write!(f, "progress"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A discrete progress event pushed to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// The event kind.
    #[serde(rename = "type")]
    pub kind: RunEventKind,
    /// The run the event belongs to.
    pub run_id: RunId,
    /// The stage the event refers to, when stage-scoped.
    pub stage_id: Option<Uuid>,
    /// The role of that stage.
    pub role: Option<StageRole>,
    /// Event payload.
    pub payload: serde_json::Value,
    /// When the event was emitted (ISO 8601).
    pub timestamp: String,
}

impl RunEvent {
    fn new(kind: RunEventKind, run_id: RunId) -> Self {
        Self {
            kind,
            run_id,
            stage_id: None,
            role: None,
            payload: serde_json::Value::Null,
            timestamp: iso_timestamp(),
        }
    }

    /// Creates a `stage_start` event for a stage record.
    #[must_use]
    pub fn stage_start(record: &StageRecord) -> Self {
        let mut event = Self::new(RunEventKind::StageStart, record.run_id);
        event.stage_id = Some(record.id);
        event.role = Some(record.role);
        event.payload = serde_json::json!({
            "executor": record.executor,
        });
        event
    }

    /// Creates a `stage_end` event for a settled stage record.
    #[must_use]
    pub fn stage_end(record: &StageRecord) -> Self {
        let mut event = Self::new(RunEventKind::StageEnd, record.run_id);
        event.stage_id = Some(record.id);
        event.role = Some(record.role);
        event.payload = serde_json::json!({
            "status": record.status,
            "latency_ms": record.metrics.latency_ms,
            "error": record.error,
        });
        event
    }

    /// Creates a `progress` event.
    #[must_use]
    pub fn progress(run_id: RunId, completed: usize, total: usize) -> Self {
        let mut event = Self::new(RunEventKind::Progress, run_id);
        event.payload = serde_json::json!({
            "completed": completed,
            "total": total,
        });
        event
    }

    /// Creates the terminal `complete` event.
    #[must_use]
    pub fn complete(
        run_id: RunId,
        status: RunStatus,
        output: Option<&str>,
        confidence: Option<ConfidenceLevel>,
    ) -> Self {
        let mut event = Self::new(RunEventKind::Complete, run_id);
        event.payload = serde_json::json!({
            "status": status,
            "output": output,
            "confidence": confidence,
        });
        event
    }

    /// Creates the terminal `error` event.
    #[must_use]
    pub fn error(run_id: RunId, stage_id: Option<Uuid>, reason: &str) -> Self {
        let mut event = Self::new(RunEventKind::Error, run_id);
        event.stage_id = stage_id;
        event.payload = serde_json::json!({
            "reason": reason,
        });
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutorId;

    #[test]
    fn test_kind_display() {
        assert_eq!(RunEventKind::StageStart.to_string(), "stage_start");
        assert_eq!(RunEventKind::Complete.to_string(), "complete");
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(RunEventKind::Complete.is_terminal());
        assert!(RunEventKind::Error.is_terminal());
        assert!(!RunEventKind::Progress.is_terminal());
        assert!(!RunEventKind::StageStart.is_terminal());
    }

    #[test]
    fn test_stage_events_carry_stage_identity() {
        let mut record = StageRecord::pending(RunId::new(), StageRole::Creator);
        record.begin(ExecutorId::new("drafter"), "ctx");

        let start = RunEvent::stage_start(&record);
        assert_eq!(start.kind, RunEventKind::StageStart);
        assert_eq!(start.stage_id, Some(record.id));
        assert_eq!(start.role, Some(StageRole::Creator));
        assert_eq!(start.payload["executor"], "drafter");

        record.fail("boom");
        let end = RunEvent::stage_end(&record);
        assert_eq!(end.payload["status"], "error");
        assert_eq!(end.payload["error"], "boom");
    }

    #[test]
    fn test_event_serializes_with_type_field() {
        let event = RunEvent::progress(RunId::new(), 2, 6);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["payload"]["completed"], 2);
        assert_eq!(json["payload"]["total"], 6);
    }
}
