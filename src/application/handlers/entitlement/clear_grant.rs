//! ClearGrantHandler - Command handler for closing a grant window early.

use std::sync::Arc;

use super::invalidate_cached_tier;
use crate::domain::entitlement::{EntitlementError, GrantKind};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{GrantRepository, TierCache};

/// Command to clear a grant window.
#[derive(Debug, Clone)]
pub struct ClearGrantCommand {
    pub user_id: UserId,
    pub kind: GrantKind,
}

pub struct ClearGrantHandler {
    grants: Arc<dyn GrantRepository>,
    tier_cache: Arc<dyn TierCache>,
}

impl ClearGrantHandler {
    pub fn new(grants: Arc<dyn GrantRepository>, tier_cache: Arc<dyn TierCache>) -> Self {
        Self { grants, tier_cache }
    }

    /// Returns whether an active window was closed. Clearing nothing is not
    /// an error.
    pub async fn handle(&self, cmd: ClearGrantCommand) -> Result<bool, EntitlementError> {
        let cleared = self
            .grants
            .clear(&cmd.user_id, cmd.kind, Timestamp::now())
            .await?;
        invalidate_cached_tier(self.tier_cache.as_ref(), &cmd.user_id).await;

        tracing::info!(user_id = %cmd.user_id, kind = %cmd.kind, cleared, "Grant window cleared");
        Ok(cleared)
    }
}
