//! In-memory adapters for every storage port.
//!
//! Used by tests and by single-process local runs. Not suitable for
//! multi-instance deployments.

mod grant_repository;
mod subscription_repository;
mod tier_cache;
mod webhook_event_repository;

pub use grant_repository::InMemoryGrantRepository;
pub use subscription_repository::InMemorySubscriptionRepository;
pub use tier_cache::InMemoryTierCache;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
