//! Tier cache port.
//!
//! Short-lived cache of resolved tiers. Entries are an optimization only;
//! every write path that can change a tier invalidates the account's entry.
//!
//! Invalidation also advances the account's generation. A reader that missed
//! takes the generation from the miss and hands it back to `put`, which
//! refuses the write if an invalidation happened in between. A tier resolved
//! before a refund can therefore never be cached after it.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::entitlement::EffectiveTier;
use crate::domain::foundation::{DomainError, UserId};

/// Outcome of a cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(EffectiveTier),
    /// No live entry. `generation` is the token to pass to `put`.
    Miss { generation: u64 },
}

#[async_trait]
pub trait TierCache: Send + Sync {
    async fn get(&self, user_id: &UserId) -> Result<CacheLookup, DomainError>;

    /// Store a resolved tier for at most `ttl`, unless the account was
    /// invalidated after `generation` was read.
    ///
    /// Returns whether the entry was written.
    async fn put(
        &self,
        user_id: &UserId,
        tier: &EffectiveTier,
        generation: u64,
        ttl: Duration,
    ) -> Result<bool, DomainError>;

    async fn invalidate(&self, user_id: &UserId) -> Result<(), DomainError>;
}
