//! HandleBillingWebhookHandler - Command handler for billing-provider webhooks.
//!
//! Authenticates and validates synchronously, then processes in a spawned
//! task bounded by a response budget. Past the budget the task keeps running
//! and records its own outcome; the provider just gets an early `accepted`.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entitlement::{
    payload_digest, BillingEvent, BillingWebhookVerifier, IdempotentWebhookProcessor,
    ProductCatalog, WebhookError,
};
use crate::domain::foundation::Timestamp;
use crate::ports::WebhookResult;

/// Default time the endpoint waits for processing before acknowledging.
pub const DEFAULT_PROCESSING_BUDGET: Duration = Duration::from_secs(2);

/// Command to handle a billing webhook.
#[derive(Debug, Clone)]
pub struct HandleBillingWebhookCommand {
    /// Raw webhook body, exactly as received.
    pub payload: Vec<u8>,
    /// Signature header value, if present.
    pub signature: Option<String>,
}

/// How the webhook was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingWebhookAck {
    Processed,
    AlreadyProcessed,
    Ignored,
    /// Still processing when the budget ran out.
    Accepted,
    /// Processing failed; the failure is recorded for the retry sweep.
    Failed,
}

impl BillingWebhookAck {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingWebhookAck::Processed => "processed",
            BillingWebhookAck::AlreadyProcessed => "already_processed",
            BillingWebhookAck::Ignored => "ignored",
            BillingWebhookAck::Accepted => "accepted",
            BillingWebhookAck::Failed => "failed",
        }
    }
}

pub struct HandleBillingWebhookHandler {
    verifier: Arc<BillingWebhookVerifier>,
    catalog: Arc<ProductCatalog>,
    processor: IdempotentWebhookProcessor,
    processing_budget: Duration,
}

impl HandleBillingWebhookHandler {
    pub fn new(
        verifier: Arc<BillingWebhookVerifier>,
        catalog: Arc<ProductCatalog>,
        processor: IdempotentWebhookProcessor,
    ) -> Self {
        Self {
            verifier,
            catalog,
            processor,
            processing_budget: DEFAULT_PROCESSING_BUDGET,
        }
    }

    pub fn with_processing_budget(mut self, budget: Duration) -> Self {
        self.processing_budget = budget;
        self
    }

    /// # Errors
    ///
    /// Authentication and validation failures are returned, with nothing
    /// recorded. `WebhookError::Unrecorded` is returned when the outcome could
    /// not be persisted, so the provider redelivers. Every recorded processing
    /// outcome is an `Ok` acknowledgement.
    pub async fn handle(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<BillingWebhookAck, WebhookError> {
        let payload = self
            .verifier
            .verify_and_parse(&cmd.payload, cmd.signature.as_deref())?;
        let digest = payload_digest(&cmd.payload);
        let event = BillingEvent::from_payload(payload, &self.catalog, Timestamp::now())?;

        let event_id = event.id.clone();
        let event_type = event.event_type.clone();
        let processor = self.processor.clone();
        let task = tokio::spawn(async move { processor.process(event, &digest).await });

        let ack = match tokio::time::timeout(self.processing_budget, task).await {
            Err(_) => {
                tracing::info!(
                    event_id = %event_id,
                    budget_ms = self.processing_budget.as_millis() as u64,
                    "Webhook processing exceeded budget, continuing in background"
                );
                BillingWebhookAck::Accepted
            }
            Ok(Err(join_error)) => {
                tracing::error!(event_id = %event_id, error = %join_error, "Webhook processing task failed");
                return Err(WebhookError::Unrecorded(format!(
                    "processing task failed: {}",
                    join_error
                )));
            }
            Ok(Ok(Ok(WebhookResult::Processed))) => BillingWebhookAck::Processed,
            Ok(Ok(Ok(WebhookResult::AlreadyProcessed))) => BillingWebhookAck::AlreadyProcessed,
            Ok(Ok(Ok(WebhookResult::Ignored))) => {
                tracing::info!(event_id = %event_id, event_type = %event_type, "Billing event ignored");
                BillingWebhookAck::Ignored
            }
            Ok(Ok(Err(e @ WebhookError::Unrecorded(_)))) => {
                tracing::error!(
                    event_id = %event_id,
                    event_type = %event_type,
                    error = %e,
                    "Billing event outcome not recorded, requesting redelivery"
                );
                return Err(e);
            }
            Ok(Ok(Err(e))) => {
                tracing::error!(
                    event_id = %event_id,
                    event_type = %event_type,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Billing event processing failed"
                );
                BillingWebhookAck::Failed
            }
        };

        Ok(ack)
    }
}
