//! Redis adapters.

mod tier_cache;

pub use tier_cache::RedisTierCache;
