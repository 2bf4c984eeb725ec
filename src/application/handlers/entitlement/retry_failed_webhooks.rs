//! RetryFailedWebhooksHandler - Re-drives webhook events recorded as failed.

use serde::Serialize;
use std::sync::Arc;

use crate::domain::entitlement::{EntitlementError, IdempotentWebhookProcessor};
use crate::ports::{WebhookEventRepository, WebhookResult};

pub const DEFAULT_RETRY_BATCH_SIZE: u32 = 100;

/// Outcome of one retry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryReport {
    pub retried: u32,
    pub resolved: u32,
    pub still_failing: u32,
}

pub struct RetryFailedWebhooksHandler {
    webhook_events: Arc<dyn WebhookEventRepository>,
    processor: IdempotentWebhookProcessor,
    batch_size: u32,
}

impl RetryFailedWebhooksHandler {
    pub fn new(
        webhook_events: Arc<dyn WebhookEventRepository>,
        processor: IdempotentWebhookProcessor,
    ) -> Self {
        Self {
            webhook_events,
            processor,
            batch_size: DEFAULT_RETRY_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn handle(&self) -> Result<RetryReport, EntitlementError> {
        let failed = self.webhook_events.find_failed(self.batch_size).await?;
        let mut report = RetryReport::default();

        for record in &failed {
            report.retried += 1;
            match self.processor.retry(record).await {
                Ok(WebhookResult::Processed) | Ok(WebhookResult::Ignored) => {
                    report.resolved += 1;
                    tracing::info!(
                        event_id = %record.event_id,
                        attempts = record.attempts + 1,
                        "Failed webhook event resolved on retry"
                    );
                }
                // Resolved by a concurrent redelivery.
                Ok(WebhookResult::AlreadyProcessed) => report.resolved += 1,
                Err(e) => {
                    report.still_failing += 1;
                    tracing::warn!(
                        event_id = %record.event_id,
                        attempts = record.attempts + 1,
                        error = %e,
                        "Webhook event still failing"
                    );
                }
            }
        }

        if report.retried > 0 {
            tracing::info!(
                retried = report.retried,
                resolved = report.resolved,
                still_failing = report.still_failing,
                "Webhook retry sweep complete"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryWebhookEventRepository;
    use crate::domain::entitlement::{
        BillingEvent, BillingEventHandler, BillingEventType, Tier, WebhookError,
    };
    use crate::domain::foundation::{EventId, Timestamp, UserId};
    use crate::ports::WebhookOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Fails until switched to healthy.
    struct FlakyHandler {
        healthy: AtomicBool,
    }

    #[async_trait]
    impl BillingEventHandler for FlakyHandler {
        async fn handle(&self, _event: &BillingEvent) -> Result<(), WebhookError> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(WebhookError::Database("connection reset".to_string()))
            }
        }
    }

    fn event(id: &str) -> BillingEvent {
        BillingEvent {
            id: EventId::new(id).unwrap(),
            event_type: BillingEventType::Renewal,
            user_id: UserId::new("user-1").unwrap(),
            product_id: Some("pro_monthly".to_string()),
            tier: Some(Tier::Pro),
            customer_id: None,
            occurred_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn failed_events_are_resolved_once_handler_recovers() {
        let repo = Arc::new(InMemoryWebhookEventRepository::new());
        let handler = Arc::new(FlakyHandler {
            healthy: AtomicBool::new(false),
        });
        let processor = IdempotentWebhookProcessor::new(repo.clone(), handler.clone());
        assert!(processor.process(event("evt_1"), "digest").await.is_err());
        assert!(processor.process(event("evt_2"), "digest").await.is_err());

        handler.healthy.store(true, Ordering::SeqCst);
        let sweep = RetryFailedWebhooksHandler::new(repo.clone(), processor);
        let report = sweep.handle().await.unwrap();

        assert_eq!(
            report,
            RetryReport {
                retried: 2,
                resolved: 2,
                still_failing: 0
            }
        );
        let stored = repo.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(stored.outcome, WebhookOutcome::Success);
        assert_eq!(stored.attempts, 2);
        assert_eq!(sweep.handle().await.unwrap(), RetryReport::default());
    }

    #[tokio::test]
    async fn still_failing_events_stay_failed() {
        let repo = Arc::new(InMemoryWebhookEventRepository::new());
        let processor = IdempotentWebhookProcessor::new(
            repo.clone(),
            Arc::new(FlakyHandler {
                healthy: AtomicBool::new(false),
            }),
        );
        assert!(processor.process(event("evt_1"), "digest").await.is_err());

        let report = RetryFailedWebhooksHandler::new(repo.clone(), processor)
            .handle()
            .await
            .unwrap();

        assert_eq!(report.still_failing, 1);
        let stored = repo.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(stored.outcome, WebhookOutcome::Failed);
        assert_eq!(stored.attempts, 2);
    }
}
