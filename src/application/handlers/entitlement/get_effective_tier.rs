//! GetEffectiveTierHandler - Query handler for an account's current tier.
//!
//! Checks the tier cache, then resolves from the subscription record and
//! grant windows. The cache is an accelerator only: any cache failure is
//! logged and the query falls through to the store.
//!
//! The fill is conditional on the generation seen at the miss. If a write
//! path invalidated the account while the stores were being read, the
//! resolved tier is returned but not cached.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entitlement::{resolve, EffectiveTier, EntitlementError};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{CacheLookup, GrantRepository, SubscriptionRepository, TierCache};

/// Default lifetime of a cached tier.
pub const DEFAULT_TIER_CACHE_TTL: Duration = Duration::from_secs(60);

/// Query for an account's effective tier.
#[derive(Debug, Clone)]
pub struct GetEffectiveTierQuery {
    pub user_id: UserId,
}

/// How long a resolved tier may be cached.
///
/// Never past the end of the grant that produced it, so an expiring grant
/// is not served from cache.
pub fn cache_ttl_for(tier: &EffectiveTier, ttl: Duration, now: Timestamp) -> Duration {
    match tier.expires_at {
        Some(expires_at) => {
            let remaining = expires_at.duration_since(&now).num_milliseconds();
            if remaining <= 0 {
                Duration::ZERO
            } else {
                ttl.min(Duration::from_millis(remaining as u64))
            }
        }
        None => ttl,
    }
}

pub struct GetEffectiveTierHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    grants: Arc<dyn GrantRepository>,
    tier_cache: Arc<dyn TierCache>,
    cache_ttl: Duration,
}

impl GetEffectiveTierHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        grants: Arc<dyn GrantRepository>,
        tier_cache: Arc<dyn TierCache>,
    ) -> Self {
        Self {
            subscriptions,
            grants,
            tier_cache,
            cache_ttl: DEFAULT_TIER_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub async fn handle(
        &self,
        query: GetEffectiveTierQuery,
    ) -> Result<EffectiveTier, EntitlementError> {
        let user_id = &query.user_id;

        let generation = match self.tier_cache.get(user_id).await {
            Ok(CacheLookup::Hit(cached)) => return Ok(cached),
            Ok(CacheLookup::Miss { generation }) => Some(generation),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Tier cache read failed, bypassing");
                None
            }
        };

        let (subscription, grants) = tokio::try_join!(
            self.subscriptions.find_by_user(user_id),
            self.grants.find_by_user(user_id),
        )?;

        let now = Timestamp::now();
        let tier = resolve(subscription.as_ref(), &grants, now);

        let ttl = cache_ttl_for(&tier, self.cache_ttl, now);
        if let Some(generation) = generation.filter(|_| !ttl.is_zero()) {
            match self.tier_cache.put(user_id, &tier, generation, ttl).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(user_id = %user_id, "Account invalidated during read, not caching");
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Tier cache write failed");
                }
            }
        }

        tracing::debug!(
            user_id = %user_id,
            tier = %tier.tier,
            provenance = %tier.provenance,
            "Resolved effective tier"
        );

        Ok(tier)
    }
}
