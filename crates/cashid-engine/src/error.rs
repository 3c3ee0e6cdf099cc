use std::fmt;

use cashid_core::{StatusCode, StatusConfirmation};

/// A protocol-level rejection: the status code plus the human-readable
/// message that becomes the confirmation payload.
///
/// Distinct from `cashid_core::CashIdError`: capability failures are mapped
/// into a `ValidationFailure` with `ServiceInternalError` at the point where
/// the pipeline knows which operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub status: StatusCode,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ServiceInternalError, message)
    }

    pub fn confirmation(&self) -> StatusConfirmation {
        StatusConfirmation::new(self.status, self.message.clone())
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.status, self.status.code(), self.message)
    }
}

impl std::error::Error for ValidationFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_message() {
        let failure = ValidationFailure::new(
            StatusCode::RequestExpired,
            "The request has expired and is no longer available.",
        );
        let rendered = failure.to_string();
        assert!(rendered.contains("request_expired"));
        assert!(rendered.contains("142"));
        assert!(rendered.contains("expired"));
    }

    #[test]
    fn test_internal_helper() {
        let failure = ValidationFailure::internal("could not store response object");
        assert_eq!(failure.status, StatusCode::ServiceInternalError);
    }

    #[test]
    fn test_confirmation_conversion() {
        let failure = ValidationFailure::new(StatusCode::RequestConsumed, "used");
        let confirmation = failure.confirmation();
        assert_eq!(confirmation.status, StatusCode::RequestConsumed);
        assert_eq!(confirmation.message, "used");
    }
}
