//! # Input Validation
//!
//! Field checks applied before any state change.

use crate::RelgateError;
use crate::primitives::{MAX_COMMENT_LENGTH, MAX_NAME_LENGTH, MAX_VERSION_LENGTH};

/// Trim a required label and check it is 1..=`max` bytes.
pub fn required(field: &str, value: &str, max: usize) -> Result<String, RelgateError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RelgateError::InvalidInput(format!("{} must not be empty", field)));
    }
    if trimmed.len() > max {
        return Err(RelgateError::InvalidInput(format!(
            "{} exceeds {} bytes",
            field, max
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank collapses to `None`.
pub fn optional(
    field: &str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, RelgateError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > max {
        return Err(RelgateError::InvalidInput(format!(
            "{} exceeds {} bytes",
            field, max
        )));
    }
    Ok(Some(trimmed.to_string()))
}

pub fn name(value: &str) -> Result<String, RelgateError> {
    required("name", value, MAX_NAME_LENGTH)
}

pub fn version(value: &str) -> Result<String, RelgateError> {
    required("version", value, MAX_VERSION_LENGTH)
}

pub fn description(value: Option<String>) -> Result<Option<String>, RelgateError> {
    optional("description", value, MAX_COMMENT_LENGTH)
}
