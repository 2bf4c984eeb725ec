//! Webhook error types for billing-provider webhook handling.
//!
//! Defines all error conditions that can occur during webhook processing,
//! with HTTP status code mapping and retryability semantics.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header absent from the request.
    #[error("Missing signature")]
    MissingSignature,

    /// Signature header present but not in `t=..,v1=..` form.
    #[error("Malformed signature header: {0}")]
    MalformedSignature(String),

    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is older than the tolerance window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Webhook timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Purchase event whose product maps to no tier.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    /// Optimistic concurrency retries exhausted.
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The processing outcome could not be recorded. The provider must redeliver.
    #[error("Outcome not recorded: {0}")]
    Unrecorded(String),
}

impl WebhookError {
    /// Returns true if a later retry of the same event may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_) | WebhookError::Conflict(_) | WebhookError::Unrecorded(_)
        )
    }

    /// True for failures raised before the payload was authenticated.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingSignature
                | WebhookError::MalformedSignature(_)
                | WebhookError::InvalidSignature
                | WebhookError::TimestampOutOfRange
        )
    }

    /// Maps the error to an appropriate HTTP status code.
    ///
    /// - 401: authentication failed, nothing recorded
    /// - 400: malformed request, nothing recorded
    /// - 200: ignored, or processed-and-failed (recorded, retried out of band)
    /// - 503: outcome not recorded, provider redelivers
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature
            | WebhookError::MalformedSignature(_)
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange => StatusCode::UNAUTHORIZED,

            WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            WebhookError::Ignored(_) => StatusCode::OK,

            WebhookError::UnknownProduct(_)
            | WebhookError::Conflict(_)
            | WebhookError::Database(_) => StatusCode::OK,

            WebhookError::Unrecorded(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Database(err.to_string())
    }
}
