//! HTTP adapter for entitlement endpoints.
//!
//! - `POST /webhooks/billing` - Billing-provider lifecycle events
//! - `GET /entitlements/:user_id` - Effective tier
//! - `POST /allocations` - Tier-bounded pick allocation
//! - `POST /internal/grants`, `POST /internal/grants/clear` - Grant windows
//! - `POST /internal/jobs/expire-grants`, `POST /internal/jobs/retry-webhooks` - Maintenance
//! - `GET /health` - Liveness

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{
    EntitlementApiError, EntitlementAppState, EntitlementSettings, EntitlementStores,
    WebhookApiError,
};
pub use routes::{entitlement_router, entitlement_routes, internal_routes, webhook_routes};
