//! Webhook processor - Orchestrates idempotent billing event handling.
//!
//! The processor follows these steps:
//! 1. Check if the event id was already seen (idempotency)
//! 2. Dispatch to the event handler
//! 3. Record the processing result (success, ignored, or failed)
//!
//! ## Race Condition Handling
//!
//! When multiple deliveries of one event arrive simultaneously:
//! - First to save wins (database PRIMARY KEY constraint)
//! - Others get `AlreadyExists` and return `AlreadyProcessed`
//!
//! ## Failed Events
//!
//! A failed record is not final. A redelivery or the retry sweep re-drives
//! it, and the first success resolves the record.

use async_trait::async_trait;
use std::sync::Arc;

use super::billing_event::BillingEvent;
use super::webhook_errors::WebhookError;
use crate::domain::foundation::DomainError;
use crate::ports::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome, WebhookResult,
};

/// Applies a validated billing event to domain state.
///
/// Returns `Err(WebhookError::Ignored(_))` if the event should be
/// acknowledged without effect.
#[async_trait]
pub trait BillingEventHandler: Send + Sync {
    async fn handle(&self, event: &BillingEvent) -> Result<(), WebhookError>;
}

/// Processes billing events with idempotency guarantees.
#[derive(Clone)]
pub struct IdempotentWebhookProcessor {
    repository: Arc<dyn WebhookEventRepository>,
    handler: Arc<dyn BillingEventHandler>,
}

impl IdempotentWebhookProcessor {
    pub fn new(
        repository: Arc<dyn WebhookEventRepository>,
        handler: Arc<dyn BillingEventHandler>,
    ) -> Self {
        Self {
            repository,
            handler,
        }
    }

    /// Process a billing event exactly once.
    ///
    /// # Returns
    ///
    /// - `Ok(Processed)` - event applied
    /// - `Ok(Ignored)` - event acknowledged without effect
    /// - `Ok(AlreadyProcessed)` - event id already has a final outcome
    /// - `Err(Unrecorded)` - the webhook-event store failed; nothing was recorded
    /// - `Err(_)` - processing failed; the failure is recorded
    pub async fn process(
        &self,
        event: BillingEvent,
        payload_digest: &str,
    ) -> Result<WebhookResult, WebhookError> {
        let existing = self
            .repository
            .find_by_event_id(event.id.as_str())
            .await
            .map_err(unrecorded)?;
        if let Some(existing) = existing {
            if existing.outcome.is_final() {
                return Ok(WebhookResult::AlreadyProcessed);
            }
            tracing::info!(
                event_id = %event.id,
                attempts = existing.attempts,
                "Redelivery of failed webhook event, retrying"
            );
            return self.redrive(&event).await;
        }

        let payload = serde_json::to_value(&event).map_err(|e| {
            WebhookError::Unrecorded(format!("Failed to serialize event: {}", e))
        })?;

        let result = self.handler.handle(&event).await;

        let event_id = event.id.as_str();
        let event_type = event.event_type.as_str();
        let record = match &result {
            Ok(()) => WebhookEventRecord::success(event_id, event_type, payload),
            Err(WebhookError::Ignored(reason)) => {
                WebhookEventRecord::ignored(event_id, event_type, reason, payload)
            }
            Err(e) => WebhookEventRecord::failed(event_id, event_type, e.to_string(), payload),
        }
        .for_user(event.user_id.as_str())
        .with_digest(payload_digest);

        match self.repository.save(record).await.map_err(unrecorded)? {
            SaveResult::Inserted => into_result(result),
            SaveResult::AlreadyExists => Ok(WebhookResult::AlreadyProcessed),
        }
    }

    /// Re-drives a stored failed record.
    pub async fn retry(&self, record: &WebhookEventRecord) -> Result<WebhookResult, WebhookError> {
        if record.outcome.is_final() {
            return Ok(WebhookResult::AlreadyProcessed);
        }
        let event: BillingEvent = serde_json::from_value(record.payload.clone())
            .map_err(|e| WebhookError::ParseError(format!("Stored payload unreadable: {}", e)))?;
        self.redrive(&event).await
    }

    async fn redrive(&self, event: &BillingEvent) -> Result<WebhookResult, WebhookError> {
        let result = self.handler.handle(event).await;

        let (outcome, message) = match &result {
            Ok(()) => (WebhookOutcome::Success, None),
            Err(WebhookError::Ignored(reason)) => (WebhookOutcome::Ignored, Some(reason.clone())),
            Err(e) => (WebhookOutcome::Failed, Some(e.to_string())),
        };

        let updated = self
            .repository
            .record_retry(event.id.as_str(), outcome, message, chrono::Utc::now())
            .await
            .map_err(unrecorded)?;
        if !updated {
            return Ok(WebhookResult::AlreadyProcessed);
        }
        into_result(result)
    }
}

fn unrecorded(err: DomainError) -> WebhookError {
    WebhookError::Unrecorded(err.to_string())
}

fn into_result(result: Result<(), WebhookError>) -> Result<WebhookResult, WebhookError> {
    match result {
        Ok(()) => Ok(WebhookResult::Processed),
        Err(WebhookError::Ignored(_)) => Ok(WebhookResult::Ignored),
        Err(e) => Err(e),
    }
}
