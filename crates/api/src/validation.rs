//! Request-body validation via `validator` derives.

use skillforge_core::error::CoreError;
use validator::Validate;

use crate::error::AppError;

/// Run the derived checks on `input`, reporting the first failing field.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input.validate().map_err(|errors| {
        let message = errors
            .field_errors()
            .into_iter()
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(field, errs)| {
                let detail = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field} {detail}")
            })
            .unwrap_or_else(|| "Invalid request body".to_string());
        AppError::Core(CoreError::Validation(message))
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use validator::Validate;

    use super::*;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 3, message = "must be at least 3 characters"))]
        name: String,
    }

    #[test]
    fn passing_input_is_ok() {
        assert!(validate_input(&Probe {
            name: "abc".into()
        })
        .is_ok());
    }

    #[test]
    fn failure_names_the_field() {
        let err = validate_input(&Probe { name: "a".into() }).unwrap_err();
        assert_matches!(
            err,
            AppError::Core(CoreError::Validation(msg)) if msg == "name must be at least 3 characters"
        );
    }
}
