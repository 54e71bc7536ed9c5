//! Shared utilities: timestamps and input validation.

mod timestamps;
mod validation;

pub use timestamps::{format_iso8601, iso_timestamp, now_utc, Timestamp};
pub use validation::{validate_fanout_width, validate_run_input};
