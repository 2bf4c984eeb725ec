//! Axum router configuration for entitlement endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    allocate_picks, clear_grant, get_effective_tier, grant_access, handle_billing_webhook,
    health, run_expire_grants, run_retry_webhooks, EntitlementAppState,
};

/// Public endpoints.
///
/// # Routes
/// - `GET /entitlements/:user_id` - Effective tier with provenance
/// - `POST /allocations` - Today's picks within the tier quota
pub fn entitlement_routes() -> Router<EntitlementAppState> {
    Router::new()
        .route("/entitlements/:user_id", get(get_effective_tier))
        .route("/allocations", post(allocate_picks))
}

/// Billing-provider webhook endpoint. Authenticated by signature, not by
/// caller identity.
///
/// # Routes
/// - `POST /billing` - Billing lifecycle events
pub fn webhook_routes() -> Router<EntitlementAppState> {
    Router::new().route("/billing", post(handle_billing_webhook))
}

/// Operator and job endpoints. Meant to sit behind the internal network
/// boundary.
///
/// # Routes
/// - `POST /grants` - Open a grant window
/// - `POST /grants/clear` - Close a grant window early
/// - `POST /jobs/expire-grants` - Run the grant expiration sweep once
/// - `POST /jobs/retry-webhooks` - Re-drive failed webhook events once
pub fn internal_routes() -> Router<EntitlementAppState> {
    Router::new()
        .route("/grants", post(grant_access))
        .route("/grants/clear", post(clear_grant))
        .route("/jobs/expire-grants", post(run_expire_grants))
        .route("/jobs/retry-webhooks", post(run_retry_webhooks))
}

/// Complete entitlement router.
///
/// ```ignore
/// let app = entitlement_router().with_state(EntitlementAppState::new(stores, settings));
/// ```
pub fn entitlement_router() -> Router<EntitlementAppState> {
    Router::new()
        .route("/health", get(health))
        .merge(entitlement_routes())
        .nest("/webhooks", webhook_routes())
        .nest("/internal", internal_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use secrecy::SecretString;

    use super::super::handlers::{EntitlementSettings, EntitlementStores};
    use crate::adapters::memory::{
        InMemoryGrantRepository, InMemorySubscriptionRepository, InMemoryTierCache,
        InMemoryWebhookEventRepository,
    };

    fn test_state() -> EntitlementAppState {
        EntitlementAppState::new(
            EntitlementStores {
                subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
                grants: Arc::new(InMemoryGrantRepository::new()),
                webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
                tier_cache: Arc::new(InMemoryTierCache::new()),
            },
            EntitlementSettings::new(SecretString::new("whsec_test".to_string())),
        )
    }

    #[test]
    fn entitlement_routes_creates_router() {
        let router = entitlement_routes();
        let _: Router<()> = router.with_state(test_state());
    }

    #[test]
    fn webhook_routes_creates_router() {
        let router = webhook_routes();
        let _: Router<()> = router.with_state(test_state());
    }

    #[test]
    fn internal_routes_creates_router() {
        let router = internal_routes();
        let _: Router<()> = router.with_state(test_state());
    }

    #[test]
    fn entitlement_router_combines_all_routes() {
        let router = entitlement_router();
        let _: Router<()> = router.with_state(test_state());
    }
}
