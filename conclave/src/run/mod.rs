//! Run lifecycle: the session registry and its owned state.
//!
//! The registry is the single source of truth for run status. The event
//! broadcaster and audit recorder observe registry transitions; they never
//! independently decide status.

mod cancel;
mod record;
mod registry;
mod snapshot;

pub use cancel::CancelFlag;
pub use record::{Run, RunTotals};
pub use registry::{RunRegistry, RunUpdate};
pub use snapshot::RunSnapshot;
