//! Validation helpers for orchestration inputs.

use crate::errors::ValidationError;

/// Validates the original input of a run.
///
/// Rejects empty or whitespace-only input and input exceeding `max_len`
/// bytes.
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the rejection.
pub fn validate_run_input(input: &str, max_len: usize) -> Result<(), ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::new(
            "run input cannot be empty or whitespace-only",
        ));
    }
    if input.len() > max_len {
        return Err(ValidationError::new(format!(
            "run input exceeds maximum length of {max_len} bytes (got {})",
            input.len()
        )));
    }
    Ok(())
}

/// Validates the width of a fan-out phase.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the width is zero.
pub fn validate_fanout_width(width: usize) -> Result<(), ValidationError> {
    if width == 0 {
        return Err(ValidationError::new("fan-out width must be at least 1"));
    }
    Ok(())
}
