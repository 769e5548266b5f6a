//! Credit ledger error types.

use thiserror::Error;
use velora_shared::types::TenantId;

/// Errors that can occur during credit ledger operations.
#[derive(Debug, Error)]
pub enum CreditError {
    /// Tenant not found.
    #[error("Tenant not found: {0}")]
    TenantNotFound(TenantId),

    /// Not enough credits across both pools. An expected business outcome,
    /// not an infrastructure fault.
    #[error("Insufficient credits: {available} available, {required} required")]
    InsufficientCredits {
        /// Total credits available (monthly + purchased).
        available: i64,
        /// Credits required by the operation.
        required: i64,
    },

    /// Amount must be a positive integer.
    #[error("Credit amount must be positive, got {0}")]
    InvalidAmount(i32),

    /// Balance could not be read.
    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(String),

    /// Concurrent write collision on the balance row.
    #[error("Concurrent balance update detected for tenant {0}, please retry")]
    UpdateConflict(TenantId),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl CreditError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TenantNotFound(_) => "TENANT_NOT_FOUND",
            Self::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::BalanceUnavailable(_) => "BALANCE_UNAVAILABLE",
            Self::UpdateConflict(_) => "UPDATE_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::TenantNotFound(_) => 404,
            Self::InsufficientCredits { .. } => 422,
            Self::InvalidAmount(_) => 400,
            Self::UpdateConflict(_) => 409,
            Self::BalanceUnavailable(_) | Self::Database(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UpdateConflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CreditError::InsufficientCredits {
                available: 0,
                required: 1,
            }
            .error_code(),
            "INSUFFICIENT_CREDITS"
        );
        assert_eq!(CreditError::InvalidAmount(0).error_code(), "INVALID_AMOUNT");
        assert_eq!(
            CreditError::UpdateConflict(TenantId::new()).error_code(),
            "UPDATE_CONFLICT"
        );
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            CreditError::TenantNotFound(TenantId::new()).http_status_code(),
            404
        );
        assert_eq!(
            CreditError::InsufficientCredits {
                available: 2,
                required: 5,
            }
            .http_status_code(),
            422
        );
        assert_eq!(
            CreditError::UpdateConflict(TenantId::new()).http_status_code(),
            409
        );
        assert_eq!(
            CreditError::Database("boom".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(CreditError::UpdateConflict(TenantId::new()).is_retryable());
        assert!(!CreditError::InvalidAmount(-1).is_retryable());
        assert!(!CreditError::InsufficientCredits {
            available: 0,
            required: 1,
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = CreditError::InsufficientCredits {
            available: 3,
            required: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient credits: 3 available, 5 required"
        );
    }
}
