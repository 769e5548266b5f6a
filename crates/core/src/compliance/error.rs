//! Compliance gate error types.

use thiserror::Error;

/// Errors that can occur during compliance operations.
///
/// A denied send is not an error; it is a [`super::Decision`]. These
/// variants cover infrastructure faults only.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// Consent or opt-out lookup failed.
    #[error("Consent lookup failed: {0}")]
    LookupFailed(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl ComplianceError {
    /// Returns the error code for API responses and audit events.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::LookupFailed(_) => "CONSENT_LOOKUP_FAILED",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ComplianceError::LookupFailed("x".into()).error_code(),
            "CONSENT_LOOKUP_FAILED"
        );
        assert_eq!(
            ComplianceError::Database("x".into()).error_code(),
            "DATABASE_ERROR"
        );
    }
}
