//! In-memory webhook event repository for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome};

/// Webhook event records keyed by provider event id.
///
/// `set_unavailable(true)` makes every call fail with a database error.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookEventRepository {
    records: Arc<RwLock<HashMap<String, WebhookEventRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "webhook event store unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        self.check_available()?;
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        if records.contains_key(&record.event_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(record.event_id.clone(), record);
        Ok(SaveResult::Inserted)
    }

    async fn record_retry(
        &self,
        event_id: &str,
        outcome: WebhookOutcome,
        error_message: Option<String>,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        match records.get_mut(event_id) {
            Some(record) if record.outcome == WebhookOutcome::Failed => {
                record.outcome = outcome;
                record.error_message = error_message;
                record.processed_at = processed_at;
                record.attempts += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_failed(&self, limit: u32) -> Result<Vec<WebhookEventRecord>, DomainError> {
        self.check_available()?;
        let mut failed: Vec<WebhookEventRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.outcome == WebhookOutcome::Failed)
            .cloned()
            .collect();
        failed.sort_by(|a, b| a.received_at.cmp(&b.received_at));
        failed.truncate(limit as usize);
        Ok(failed)
    }
}
