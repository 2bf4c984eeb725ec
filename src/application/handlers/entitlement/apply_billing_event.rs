//! ApplyBillingEventHandler - Applies a verified billing event to the
//! account's subscription record.
//!
//! Read, apply in memory, compare-and-swap. A version conflict means another
//! event for the same account landed first; re-read and try again.

use async_trait::async_trait;
use std::sync::Arc;

use super::invalidate_cached_tier;
use crate::domain::entitlement::{BillingEvent, BillingEventHandler, TransitionOutcome, WebhookError};
use crate::domain::foundation::Timestamp;
use crate::ports::{SubscriptionRepository, SwapResult, TierCache};

/// Default number of read-apply-swap attempts per event.
pub const DEFAULT_MAX_APPLY_ATTEMPTS: u32 = 5;

pub struct ApplyBillingEventHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    tier_cache: Arc<dyn TierCache>,
    max_attempts: u32,
}

impl ApplyBillingEventHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        tier_cache: Arc<dyn TierCache>,
    ) -> Self {
        Self {
            subscriptions,
            tier_cache,
            max_attempts: DEFAULT_MAX_APPLY_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

#[async_trait]
impl BillingEventHandler for ApplyBillingEventHandler {
    async fn handle(&self, event: &BillingEvent) -> Result<(), WebhookError> {
        for attempt in 1..=self.max_attempts {
            let now = Timestamp::now();
            let current = self
                .subscriptions
                .find_or_create(&event.user_id, now)
                .await?;

            let mut next = current.clone();
            let (from, to) = match next.apply(event, now)? {
                TransitionOutcome::Applied { from, to } => (from, to),
                TransitionOutcome::Duplicate => {
                    tracing::debug!(event_id = %event.id, "Event already applied to subscription");
                    return Ok(());
                }
                TransitionOutcome::Stale { last_event_at } => {
                    tracing::warn!(
                        event_id = %event.id,
                        user_id = %event.user_id,
                        event_type = %event.event_type,
                        occurred_at = ?event.occurred_at,
                        last_event_at = ?last_event_at,
                        "Discarding stale billing event"
                    );
                    return Err(WebhookError::Ignored(
                        "event predates the last applied event".to_string(),
                    ));
                }
            };

            match self
                .subscriptions
                .compare_and_swap(&next, current.version)
                .await?
            {
                SwapResult::Updated(stored) => {
                    tracing::info!(
                        event_id = %event.id,
                        user_id = %event.user_id,
                        event_type = %event.event_type,
                        from = %from,
                        to = %to,
                        tier = ?stored.tier,
                        version = stored.version,
                        "Subscription updated"
                    );
                    invalidate_cached_tier(self.tier_cache.as_ref(), &event.user_id).await;
                    return Ok(());
                }
                SwapResult::Conflict => {
                    tracing::debug!(
                        event_id = %event.id,
                        user_id = %event.user_id,
                        attempt,
                        "Subscription version conflict, retrying"
                    );
                }
            }
        }

        Err(WebhookError::Conflict(format!(
            "gave up on {} after {} attempts",
            event.user_id, self.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemorySubscriptionRepository, InMemoryTierCache};
    use crate::domain::entitlement::{
        BillingEventType, EffectiveTier, SubscriptionRecord, SubscriptionStatus, Tier,
    };
    use crate::domain::foundation::{DomainError, EventId, UserId};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    /// Delegates to the in-memory store but reports a conflict for the
    /// first `conflicts` swaps.
    struct ContendedRepository {
        inner: InMemorySubscriptionRepository,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl SubscriptionRepository for ContendedRepository {
        async fn find_by_user(
            &self,
            user_id: &UserId,
        ) -> Result<Option<SubscriptionRecord>, DomainError> {
            self.inner.find_by_user(user_id).await
        }

        async fn find_or_create(
            &self,
            user_id: &UserId,
            now: Timestamp,
        ) -> Result<SubscriptionRecord, DomainError> {
            self.inner.find_or_create(user_id, now).await
        }

        async fn compare_and_swap(
            &self,
            record: &SubscriptionRecord,
            expected_version: i64,
        ) -> Result<SwapResult, DomainError> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Ok(SwapResult::Conflict);
            }
            self.inner.compare_and_swap(record, expected_version).await
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn event(id: &str, event_type: BillingEventType, secs: i64) -> BillingEvent {
        BillingEvent {
            id: EventId::new(id).unwrap(),
            event_type,
            user_id: user(),
            product_id: Some("pro_monthly".to_string()),
            tier: Some(Tier::Pro),
            customer_id: Some("cus_1".to_string()),
            occurred_at: Timestamp::from_unix_secs(1_700_000_000 + secs).unwrap(),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn purchase_creates_active_record_and_invalidates_cache() {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let cache = Arc::new(InMemoryTierCache::new());
        cache
            .seed(&user(), &EffectiveTier::free(), Duration::from_secs(60))
            .await;
        let handler = ApplyBillingEventHandler::new(repo.clone(), cache.clone());

        handler
            .handle(&event("evt_1", BillingEventType::InitialPurchase, 0))
            .await
            .unwrap();

        let record = repo.find_by_user(&user()).await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.tier, Some(Tier::Pro));
        assert_eq!(record.provider_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(record.version, 1);
        assert_eq!(cache.cached(&user()).await, None);
    }

    #[tokio::test]
    async fn conflicts_are_retried_until_swap_succeeds() {
        let repo = Arc::new(ContendedRepository {
            inner: InMemorySubscriptionRepository::new(),
            conflicts: AtomicU32::new(2),
        });
        let handler =
            ApplyBillingEventHandler::new(repo.clone(), Arc::new(InMemoryTierCache::new()));

        handler
            .handle(&event("evt_1", BillingEventType::InitialPurchase, 0))
            .await
            .unwrap();

        let record = repo.find_by_user(&user()).await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn exhausted_retries_are_a_retryable_conflict() {
        let repo = Arc::new(ContendedRepository {
            inner: InMemorySubscriptionRepository::new(),
            conflicts: AtomicU32::new(10),
        });
        let handler = ApplyBillingEventHandler::new(repo, Arc::new(InMemoryTierCache::new()))
            .with_max_attempts(3);

        let result = handler
            .handle(&event("evt_1", BillingEventType::InitialPurchase, 0))
            .await;

        match result {
            Err(e @ WebhookError::Conflict(_)) => assert!(e.is_retryable()),
            other => panic!("Expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stale_event_is_ignored_without_write() {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let handler =
            ApplyBillingEventHandler::new(repo.clone(), Arc::new(InMemoryTierCache::new()));
        handler
            .handle(&event("evt_buy", BillingEventType::InitialPurchase, 0))
            .await
            .unwrap();
        handler
            .handle(&event("evt_cancel", BillingEventType::Cancellation, 100))
            .await
            .unwrap();

        let result = handler
            .handle(&event("evt_renew", BillingEventType::Renewal, 50))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        let record = repo.find_by_user(&user()).await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::CancelledPendingExpiry);
        assert_eq!(record.version, 2);
    }

    #[tokio::test]
    async fn reapplying_same_event_is_noop() {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let handler =
            ApplyBillingEventHandler::new(repo.clone(), Arc::new(InMemoryTierCache::new()));
        let e = event("evt_buy", BillingEventType::InitialPurchase, 0);

        handler.handle(&e).await.unwrap();
        handler.handle(&e).await.unwrap();

        assert_eq!(repo.find_by_user(&user()).await.unwrap().unwrap().version, 1);
    }
}
