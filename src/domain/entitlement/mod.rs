//! Entitlement domain module.
//!
//! Decides which tier an account is entitled to from three sources: the
//! billing provider's subscription state, locally issued 24-hour grants, and
//! the free floor.
//!
//! # Module Structure
//!
//! - `tier` / `tier_quotas` - Tiers and their daily quotas
//! - `subscription` - Subscription record and billing transition table
//! - `grant` - Time-boxed grant windows
//! - `resolver` - Priority resolution into an `EffectiveTier`
//! - `billing_event` / `product_catalog` - Validated billing events
//! - `webhook_verifier` / `webhook_processor` - Authenticated, idempotent intake

mod billing_event;
mod effective_tier;
mod errors;
mod grant;
mod product_catalog;
mod resolver;
mod subscription;
mod subscription_status;
mod tier;
mod tier_quotas;
mod webhook_errors;
mod webhook_processor;
mod webhook_verifier;

pub use billing_event::{BillingEvent, BillingEventType, BillingWebhookPayload};
pub use effective_tier::{EffectiveTier, Provenance};
pub use errors::EntitlementError;
pub use grant::{GrantKind, GrantWindow, GRANT_WINDOW_HOURS};
pub use product_catalog::ProductCatalog;
pub use resolver::resolve;
pub use subscription::{SubscriptionRecord, TransitionOutcome};
pub use subscription_status::SubscriptionStatus;
pub use tier::Tier;
pub use tier_quotas::{TierQuotas, MAX_DAILY_QUOTA};
pub use webhook_errors::WebhookError;
pub use webhook_processor::{BillingEventHandler, IdempotentWebhookProcessor};
pub use webhook_verifier::{
    payload_digest, sign_payload, BillingWebhookVerifier, SignatureHeader,
    DEFAULT_TOLERANCE_SECS,
};
