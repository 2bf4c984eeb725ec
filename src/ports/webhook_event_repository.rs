//! WebhookEventRepository port - Interface for tracking billing webhooks.
//!
//! Every authenticated webhook leaves exactly one record, keyed by the
//! provider's event id. The record is the idempotency gate and the audit
//! trail; records are never deleted.
//!
//! A record's identity, type, digest and payload never change. Only a
//! `failed` outcome may later be resolved by the retry sweep.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DomainError, ValidationError};

/// Processing outcome of a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Success,
    Ignored,
    Failed,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Success => "success",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Failed => "failed",
        }
    }

    /// Success and ignored outcomes are final.
    pub fn is_final(&self) -> bool {
        !matches!(self, WebhookOutcome::Failed)
    }
}

impl fmt::Display for WebhookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WebhookOutcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(WebhookOutcome::Success),
            "ignored" => Ok(WebhookOutcome::Ignored),
            "failed" => Ok(WebhookOutcome::Failed),
            other => Err(ValidationError::invalid_format(
                "outcome",
                format!("unknown webhook outcome '{}'", other),
            )),
        }
    }
}

/// Record of a received webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    /// Provider event id; unique.
    pub event_id: String,

    /// Wire event type, as received.
    pub event_type: String,

    pub user_id: Option<String>,

    /// SHA-256 hex digest of the raw request body.
    pub payload_digest: String,

    /// Validated event, used to re-drive failures.
    pub payload: serde_json::Value,

    pub outcome: WebhookOutcome,

    /// Failure or ignore reason.
    pub error_message: Option<String>,

    /// Number of processing attempts so far.
    pub attempts: i32,

    pub received_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
}

impl WebhookEventRecord {
    fn with_outcome(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        outcome: WebhookOutcome,
        error_message: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            user_id: None,
            payload_digest: String::new(),
            payload,
            outcome,
            error_message,
            attempts: 1,
            received_at: now,
            processed_at: now,
        }
    }

    /// Creates a new success record.
    pub fn success(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_outcome(event_id, event_type, WebhookOutcome::Success, None, payload)
    }

    /// Creates a new ignored record.
    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_outcome(
            event_id,
            event_type,
            WebhookOutcome::Ignored,
            Some(reason.into()),
            payload,
        )
    }

    /// Creates a new failure record.
    pub fn failed(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        error: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_outcome(
            event_id,
            event_type,
            WebhookOutcome::Failed,
            Some(error.into()),
            payload,
        )
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.payload_digest = digest.into();
        self
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (duplicate event).
    AlreadyExists,
}

/// Result of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResult {
    /// Event was processed successfully.
    Processed,
    /// Event was acknowledged without effect (unknown type, no-op).
    Ignored,
    /// Event was already processed (idempotent skip).
    AlreadyProcessed,
}

/// Port for storing and retrieving webhook event records.
///
/// Implementations should use database constraints (PRIMARY KEY on event_id)
/// to prevent race conditions during concurrent webhook processing.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Find a previously received event by its provider event id.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Attempt to save a webhook event record.
    ///
    /// Uses `ON CONFLICT DO NOTHING` semantics to handle race conditions.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Records a retry of a failed event.
    ///
    /// Applies only while the stored outcome is `failed`; increments the
    /// attempt count. Returns false when the record is missing or already final.
    async fn record_retry(
        &self,
        event_id: &str,
        outcome: WebhookOutcome,
        error_message: Option<String>,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Oldest failed records first.
    async fn find_failed(&self, limit: u32) -> Result<Vec<WebhookEventRecord>, DomainError>;
}
