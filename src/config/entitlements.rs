//! Tier quota and tier cache configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::entitlement::TierQuotas;

/// Daily quotas per tier and tier cache lifetime
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementsConfig {
    #[serde(default = "default_free_quota")]
    pub free_daily_quota: u32,

    #[serde(default = "default_pro_quota")]
    pub pro_daily_quota: u32,

    #[serde(default = "default_elite_quota")]
    pub elite_daily_quota: u32,

    /// Upper bound on how long a resolved tier is cached
    #[serde(default = "default_tier_cache_ttl")]
    pub tier_cache_ttl_secs: u64,
}

impl EntitlementsConfig {
    pub fn quotas(&self) -> Result<TierQuotas, ValidationError> {
        TierQuotas::new(
            self.free_daily_quota,
            self.pro_daily_quota,
            self.elite_daily_quota,
        )
        .map_err(|e| ValidationError::InvalidQuota(e.to_string()))
    }

    pub fn tier_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.tier_cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.quotas()?;
        Ok(())
    }
}

impl Default for EntitlementsConfig {
    fn default() -> Self {
        Self {
            free_daily_quota: default_free_quota(),
            pro_daily_quota: default_pro_quota(),
            elite_daily_quota: default_elite_quota(),
            tier_cache_ttl_secs: default_tier_cache_ttl(),
        }
    }
}

fn default_free_quota() -> u32 {
    3
}

fn default_pro_quota() -> u32 {
    20
}

fn default_elite_quota() -> u32 {
    40
}

fn default_tier_cache_ttl() -> u64 {
    60
}
