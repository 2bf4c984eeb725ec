//! AllocatePicksHandler - Selects today's picks for an account.
//!
//! Resolves the account's effective tier, looks up that tier's daily quota,
//! and runs the preference-first allocation over the candidate pool.

use std::sync::Arc;

use crate::application::handlers::entitlement::{GetEffectiveTierHandler, GetEffectiveTierQuery};
use crate::domain::allocation::{allocate, Allocation, ContentItem, Sport, SportPreferences};
use crate::domain::entitlement::{EffectiveTier, EntitlementError, TierQuotas};
use crate::domain::foundation::UserId;

/// Command to allocate picks.
#[derive(Debug, Clone)]
pub struct AllocatePicksCommand {
    pub user_id: UserId,
    pub sport_preferences: Vec<Sport>,
    pub candidate_pool: Vec<ContentItem>,
}

/// Result of allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatePicksResult {
    pub effective_tier: EffectiveTier,
    pub quota: u32,
    pub allocation: Allocation,
}

pub struct AllocatePicksHandler {
    tiers: Arc<GetEffectiveTierHandler>,
    quotas: TierQuotas,
}

impl AllocatePicksHandler {
    pub fn new(tiers: Arc<GetEffectiveTierHandler>, quotas: TierQuotas) -> Self {
        Self { tiers, quotas }
    }

    pub async fn handle(
        &self,
        cmd: AllocatePicksCommand,
    ) -> Result<AllocatePicksResult, EntitlementError> {
        for item in &cmd.candidate_pool {
            item.validate()?;
        }

        let effective_tier = self
            .tiers
            .handle(GetEffectiveTierQuery {
                user_id: cmd.user_id.clone(),
            })
            .await?;
        let quota = self.quotas.for_tier(effective_tier.tier);

        let preferences = SportPreferences::new(cmd.sport_preferences);
        let pool_size = cmd.candidate_pool.len();
        let allocation = allocate(quota as usize, &preferences, cmd.candidate_pool);

        tracing::info!(
            user_id = %cmd.user_id,
            tier = %effective_tier.tier,
            quota,
            pool_size,
            selected = allocation.selected.len(),
            fallback_used = allocation.fallback_used,
            "Allocated picks"
        );

        Ok(AllocatePicksResult {
            effective_tier,
            quota,
            allocation,
        })
    }
}
