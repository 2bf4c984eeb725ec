//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `SubscriptionRepository` - Subscription records with optimistic concurrency
//! - `GrantRepository` - Time-boxed grant windows
//!
//! ## Webhook Ports
//!
//! - `WebhookEventRepository` - Billing webhook idempotency and audit trail
//!
//! ## Cache Ports
//!
//! - `TierCache` - Short-TTL cache of resolved tiers

mod grant_repository;
mod subscription_repository;
mod tier_cache;
mod webhook_event_repository;

pub use grant_repository::GrantRepository;
pub use subscription_repository::{SubscriptionRepository, SwapResult};
pub use tier_cache::{CacheLookup, TierCache};
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome, WebhookResult,
};
