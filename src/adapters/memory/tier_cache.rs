//! In-memory tier cache with per-entry deadlines.
//!
//! Generations come from one process-wide counter. Each account remembers the
//! counter value of its last invalidation, and a `put` carrying an older
//! generation is refused. Expired entries and invalidation marks are purged
//! once the map doubles in size since the last purge; the purge raises a
//! floor below which every `put` is refused, so forgetting a mark never lets
//! a stale write through.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::entitlement::EffectiveTier;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{CacheLookup, TierCache};

const MIN_PURGE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
struct Slot {
    entry: Option<(EffectiveTier, Instant)>,
    invalidated_at: u64,
}

#[derive(Debug)]
struct State {
    slots: HashMap<UserId, Slot>,
    counter: u64,
    floor: u64,
    purge_at: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            counter: 0,
            floor: 0,
            purge_at: MIN_PURGE_THRESHOLD,
        }
    }
}

impl State {
    fn purge(&mut self, now: Instant, min_threshold: usize) {
        self.slots
            .retain(|_, slot| matches!(slot.entry, Some((_, deadline)) if now < deadline));
        for slot in self.slots.values_mut() {
            slot.invalidated_at = 0;
        }
        self.floor = self.counter;
        self.purge_at = (self.slots.len() * 2).max(min_threshold);
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryTierCache {
    state: Arc<RwLock<State>>,
    purge_threshold: usize,
}

impl Default for InMemoryTierCache {
    fn default() -> Self {
        Self::with_purge_threshold(MIN_PURGE_THRESHOLD)
    }
}

impl InMemoryTierCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that purges once it holds `threshold` accounts.
    pub fn with_purge_threshold(threshold: usize) -> Self {
        let state = State {
            purge_at: threshold,
            ..State::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            purge_threshold: threshold,
        }
    }

    /// Number of accounts currently tracked, live or not.
    pub async fn len(&self) -> usize {
        self.state.read().await.slots.len()
    }

    /// Live cached tier for an account, if any.
    pub async fn cached(&self, user_id: &UserId) -> Option<EffectiveTier> {
        match self.get(user_id).await {
            Ok(CacheLookup::Hit(tier)) => Some(tier),
            _ => None,
        }
    }

    /// Writes an entry at the current generation.
    pub async fn seed(&self, user_id: &UserId, tier: &EffectiveTier, ttl: Duration) {
        if let Ok(CacheLookup::Miss { generation }) = self.get(user_id).await {
            let _ = self.put(user_id, tier, generation, ttl).await;
        }
    }
}

#[async_trait]
impl TierCache for InMemoryTierCache {
    async fn get(&self, user_id: &UserId) -> Result<CacheLookup, DomainError> {
        let state = self.state.read().await;
        let live = state
            .slots
            .get(user_id)
            .and_then(|slot| slot.entry)
            .filter(|(_, deadline)| Instant::now() < *deadline);

        Ok(match live {
            Some((tier, _)) => CacheLookup::Hit(tier),
            None => CacheLookup::Miss {
                generation: state.counter,
            },
        })
    }

    async fn put(
        &self,
        user_id: &UserId,
        tier: &EffectiveTier,
        generation: u64,
        ttl: Duration,
    ) -> Result<bool, DomainError> {
        if ttl.is_zero() {
            return Ok(false);
        }
        let mut state = self.state.write().await;
        let now = Instant::now();

        if state.slots.len() >= state.purge_at {
            state.purge(now, self.purge_threshold);
        }

        let invalidated_at = state
            .slots
            .get(user_id)
            .map(|slot| slot.invalidated_at)
            .unwrap_or(0);
        if generation < state.floor || invalidated_at > generation {
            return Ok(false);
        }

        state.slots.entry(user_id.clone()).or_default().entry = Some((*tier, now + ttl));
        Ok(true)
    }

    async fn invalidate(&self, user_id: &UserId) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.counter += 1;
        let counter = state.counter;
        let slot = state.slots.entry(user_id.clone()).or_default();
        slot.entry = None;
        slot.invalidated_at = counter;
        Ok(())
    }
}
