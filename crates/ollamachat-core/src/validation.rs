//! Parsing helpers for settings typed in by a user.

use crate::error::ValidationError;

/// Accepts `0`, which for a context window means "send no history".
pub fn parse_non_negative_int(value: &str, field: &str) -> Result<u32, ValidationError> {
    let n = parse_int(value, field)?;
    if n < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            expected: "a non-negative number".to_string(),
        });
    }
    Ok(n as u32)
}

pub fn parse_float_in_range(
    value: &str,
    field: &str,
    min: f64,
    max: f64,
) -> Result<f64, ValidationError> {
    let n: f64 = value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidNumber {
            field: field.to_string(),
        })?;
    check_float_in_range(n, field, min, max)
}

pub fn check_float_in_range(
    n: f64,
    field: &str,
    min: f64,
    max: f64,
) -> Result<f64, ValidationError> {
    if !n.is_finite() || n < min || n > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            expected: format!("a number between {min:.1} and {max:.1}"),
        });
    }
    Ok(n)
}

fn parse_int(value: &str, field: &str) -> Result<i64, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }
    trimmed
        .parse::<i64>()
        .ok()
        .filter(|n| *n <= u32::MAX as i64)
        .ok_or_else(|| ValidationError::InvalidNumber {
            field: field.to_string(),
        })
}
