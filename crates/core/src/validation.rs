//! Small shared checks used by the entity modules.

use crate::error::CoreError;

/// Reject `value` unless it is one of `allowed`.
pub fn validate_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), CoreError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid {field} '{value}'. Must be one of: {}",
            allowed.join(", ")
        )))
    }
}

/// Reject integers outside the inclusive range `min..=max`.
pub fn validate_range(field: &str, value: i32, min: i32, max: i32) -> Result<(), CoreError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be between {min} and {max}"
        )))
    }
}

/// Reject blank strings after trimming.
pub fn validate_not_blank(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        Err(CoreError::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn one_of_lists_allowed_values_on_failure() {
        let err = validate_one_of("level", "guru", &["beginner", "expert"]).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("beginner, expert"));
    }

    #[test]
    fn range_is_inclusive() {
        assert!(validate_range("difficulty", 1, 1, 10).is_ok());
        assert!(validate_range("difficulty", 10, 1, 10).is_ok());
        assert!(validate_range("difficulty", 0, 1, 10).is_err());
        assert!(validate_range("difficulty", 11, 1, 10).is_err());
    }

    #[test]
    fn blank_strings_rejected() {
        assert!(validate_not_blank("name", "  ").is_err());
        assert!(validate_not_blank("name", "Rust").is_ok());
    }
}
