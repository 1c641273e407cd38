use std::fmt::Display;

use axum::http::StatusCode;
use tracing::error;

/// Field-level input problems, rejected before anything touches storage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("`from` must not be after `to`")]
    InvertedRange,
    #[error("days must be between 1 and {max}")]
    ProjectionDays { max: u32 },
    #[error("username must be at least 3 characters and contain no whitespace")]
    InvalidUsername,
    #[error("password must be at least 6 characters")]
    PasswordTooShort,
}

impl From<ValidationError> for (StatusCode, String) {
    fn from(e: ValidationError) -> Self {
        (StatusCode::BAD_REQUEST, e.to_string())
    }
}

/// Logs the cause and hides it behind a 500.
pub fn internal<E: Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let (status, msg): (StatusCode, String) = ValidationError::OutOfRange {
            field: "calories",
            min: 0.0,
            max: 20000.0,
        }
        .into();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "calories must be between 0 and 20000");
    }

    #[test]
    fn internal_hides_details() {
        let (status, msg) = internal(anyhow::anyhow!("connection refused"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!msg.contains("refused"));
    }
}
