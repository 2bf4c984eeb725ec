//! Entitlement-specific error types.
//!
//! Errors raised by grant management, tier queries, and allocation.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | StoreUnavailable | 503 |
//! | Internal | 500 |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Entitlement operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntitlementError {
    /// Request failed validation.
    #[error("Validation failed on '{field}': {message}")]
    Validation { field: String, message: String },

    /// The backing store is unreachable; the caller may retry.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EntitlementError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EntitlementError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EntitlementError::StoreUnavailable(_))
    }
}

impl From<ValidationError> for EntitlementError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field.clone(),
        };
        EntitlementError::validation(field, err.to_string())
    }
}

impl From<DomainError> for EntitlementError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => EntitlementError::Validation {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            _ if err.is_transient() => EntitlementError::StoreUnavailable(err.to_string()),
            _ => EntitlementError::Internal(err.to_string()),
        }
    }
}
