//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresSubscriptionRepository` - Subscription records with version CAS
//! - `PostgresGrantRepository` - Grant windows with conditional retirement
//! - `PostgresWebhookEventRepository` - Webhook idempotency keyed on event id

mod grant_repository;
mod subscription_repository;
mod webhook_event_repository;

pub use grant_repository::PostgresGrantRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;
