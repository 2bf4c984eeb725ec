//! In-memory subscription repository for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::entitlement::SubscriptionRecord;
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::ports::{SubscriptionRepository, SwapResult};

/// Subscription records in a HashMap; the write lock makes CAS atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionRepository {
    records: Arc<RwLock<HashMap<UserId, SubscriptionRecord>>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing versioning.
    pub async fn insert(&self, record: SubscriptionRecord) {
        self.records
            .write()
            .await
            .insert(record.user_id.clone(), record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>, DomainError> {
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn find_or_create(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<SubscriptionRecord, DomainError> {
        let mut records = self.records.write().await;
        Ok(records
            .entry(user_id.clone())
            .or_insert_with(|| SubscriptionRecord::new(user_id.clone(), now))
            .clone())
    }

    async fn compare_and_swap(
        &self,
        record: &SubscriptionRecord,
        expected_version: i64,
    ) -> Result<SwapResult, DomainError> {
        let mut records = self.records.write().await;
        let current_version = records.get(&record.user_id).map(|r| r.version);
        if current_version != Some(expected_version) {
            return Ok(SwapResult::Conflict);
        }
        let mut stored = record.clone();
        stored.version = expected_version + 1;
        records.insert(stored.user_id.clone(), stored.clone());
        Ok(SwapResult::Updated(stored))
    }
}
