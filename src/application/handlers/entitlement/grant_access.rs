//! GrantAccessHandler - Command handler for opening a grant window.
//!
//! Granting is an unconditional overwrite: the window for (user, kind) is
//! reset to start now and run 24 hours. Durations never stack.

use std::sync::Arc;

use super::invalidate_cached_tier;
use crate::domain::entitlement::{EntitlementError, GrantKind, GrantWindow, Tier};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{GrantRepository, TierCache};

/// Command to grant temporary access.
#[derive(Debug, Clone)]
pub struct GrantAccessCommand {
    pub user_id: UserId,
    pub kind: GrantKind,
    pub tier: Tier,
}

pub struct GrantAccessHandler {
    grants: Arc<dyn GrantRepository>,
    tier_cache: Arc<dyn TierCache>,
}

impl GrantAccessHandler {
    pub fn new(grants: Arc<dyn GrantRepository>, tier_cache: Arc<dyn TierCache>) -> Self {
        Self { grants, tier_cache }
    }

    pub async fn handle(&self, cmd: GrantAccessCommand) -> Result<GrantWindow, EntitlementError> {
        // A free grant would outrank a paid subscription in resolution.
        if !cmd.tier.is_paid() {
            return Err(EntitlementError::validation(
                "tier",
                "grants must carry a paid tier",
            ));
        }

        let window = GrantWindow::issue(cmd.user_id, cmd.kind, cmd.tier, Timestamp::now());
        self.grants.upsert(&window).await?;
        invalidate_cached_tier(self.tier_cache.as_ref(), &window.user_id).await;

        tracing::info!(
            user_id = %window.user_id,
            kind = %window.kind,
            tier = %window.tier,
            expires_at = ?window.expires_at,
            "Grant window opened"
        );

        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryGrantRepository, InMemoryTierCache};
    use crate::domain::entitlement::{EffectiveTier, GRANT_WINDOW_HOURS};
    use std::time::Duration;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn cmd(kind: GrantKind, tier: Tier) -> GrantAccessCommand {
        GrantAccessCommand {
            user_id: user(),
            kind,
            tier,
        }
    }

    #[tokio::test]
    async fn grant_opens_24_hour_window() {
        let repo = Arc::new(InMemoryGrantRepository::new());
        let handler = GrantAccessHandler::new(repo.clone(), Arc::new(InMemoryTierCache::new()));

        let window = handler.handle(cmd(GrantKind::DayPass, Tier::Elite)).await.unwrap();

        assert!(window.active);
        assert_eq!(
            window.expires_at.duration_since(&window.granted_at).num_hours(),
            GRANT_WINDOW_HOURS
        );
        assert_eq!(repo.get(&user(), GrantKind::DayPass).await, Some(window));
    }

    #[tokio::test]
    async fn regrant_resets_window_instead_of_stacking() {
        let repo = Arc::new(InMemoryGrantRepository::new());
        let handler = GrantAccessHandler::new(repo.clone(), Arc::new(InMemoryTierCache::new()));

        let first = handler.handle(cmd(GrantKind::DayPass, Tier::Pro)).await.unwrap();
        let second = handler.handle(cmd(GrantKind::DayPass, Tier::Elite)).await.unwrap();

        assert!(!second.expires_at.is_before(&first.expires_at));
        assert_eq!(
            second.expires_at.duration_since(&second.granted_at).num_hours(),
            GRANT_WINDOW_HOURS
        );
        let stored = repo.get(&user(), GrantKind::DayPass).await.unwrap();
        assert_eq!(stored.tier, Tier::Elite);
    }

    #[tokio::test]
    async fn free_tier_grant_is_rejected() {
        let repo = Arc::new(InMemoryGrantRepository::new());
        let handler = GrantAccessHandler::new(repo.clone(), Arc::new(InMemoryTierCache::new()));

        let result = handler.handle(cmd(GrantKind::WelcomeBonus, Tier::Free)).await;

        assert!(matches!(result, Err(EntitlementError::Validation { .. })));
        assert!(repo.get(&user(), GrantKind::WelcomeBonus).await.is_none());
    }

    #[tokio::test]
    async fn grant_invalidates_cached_tier() {
        let cache = Arc::new(InMemoryTierCache::new());
        cache
            .seed(&user(), &EffectiveTier::free(), Duration::from_secs(60))
            .await;
        let handler = GrantAccessHandler::new(Arc::new(InMemoryGrantRepository::new()), cache.clone());

        handler.handle(cmd(GrantKind::DayPass, Tier::Pro)).await.unwrap();

        assert_eq!(cache.cached(&user()).await, None);
    }

    #[tokio::test]
    async fn unavailable_store_is_retryable() {
        let repo = Arc::new(InMemoryGrantRepository::new());
        repo.set_unavailable(true);
        let handler = GrantAccessHandler::new(repo, Arc::new(InMemoryTierCache::new()));

        let err = handler.handle(cmd(GrantKind::DayPass, Tier::Pro)).await.unwrap_err();

        assert!(err.is_retryable());
    }
}
