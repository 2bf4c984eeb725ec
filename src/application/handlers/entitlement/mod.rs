//! Entitlement command and query handlers.
//!
//! ## Commands
//!
//! - `HandleBillingWebhookCommand` - Verify and process a billing webhook
//! - `GrantAccessCommand` - Open a 24-hour grant window
//! - `ClearGrantCommand` - Close a grant window early
//! - `ExpireGrantsHandler` - Retire expired grant windows (scheduled)
//! - `RetryFailedWebhooksHandler` - Re-drive failed webhook events (scheduled)
//!
//! ## Queries
//!
//! - `GetEffectiveTierQuery` - Resolve an account's tier right now

mod apply_billing_event;
mod clear_grant;
mod expire_grants;
mod get_effective_tier;
mod grant_access;
mod handle_billing_webhook;
mod retry_failed_webhooks;

pub use apply_billing_event::{ApplyBillingEventHandler, DEFAULT_MAX_APPLY_ATTEMPTS};
pub use clear_grant::{ClearGrantCommand, ClearGrantHandler};
pub use expire_grants::{ExpireGrantsHandler, SweepReport};
pub use get_effective_tier::{cache_ttl_for, GetEffectiveTierHandler, GetEffectiveTierQuery};
pub use grant_access::{GrantAccessCommand, GrantAccessHandler};
pub use handle_billing_webhook::{
    BillingWebhookAck, HandleBillingWebhookCommand, HandleBillingWebhookHandler,
    DEFAULT_PROCESSING_BUDGET,
};
pub use retry_failed_webhooks::{RetryFailedWebhooksHandler, RetryReport};

use crate::domain::foundation::UserId;
use crate::ports::TierCache;

/// Drops the cached tier after a write. A failure only delays visibility by
/// one TTL, so it is logged rather than returned.
pub(crate) async fn invalidate_cached_tier(cache: &dyn TierCache, user_id: &UserId) {
    if let Err(e) = cache.invalidate(user_id).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to invalidate cached tier");
    }
}
