//! Daily pick quota per tier.

use serde::{Deserialize, Serialize};

use super::Tier;
use crate::domain::foundation::ValidationError;

/// Upper bound accepted for any single tier's quota.
pub const MAX_DAILY_QUOTA: u32 = 1_000;

/// Daily content quota for each tier.
///
/// | Tier  | Default |
/// |-------|---------|
/// | Free  | 3       |
/// | Pro   | 20      |
/// | Elite | 40      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierQuotas {
    free: u32,
    pro: u32,
    elite: u32,
}

impl TierQuotas {
    /// Builds a quota table, rejecting any tier without a usable quota.
    pub fn new(free: u32, pro: u32, elite: u32) -> Result<Self, ValidationError> {
        let quotas = Self { free, pro, elite };
        quotas.validate()?;
        Ok(quotas)
    }

    /// Every tier must have a quota in `1..=MAX_DAILY_QUOTA`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for tier in Tier::ALL {
            let quota = self.for_tier(tier);
            if quota == 0 || quota > MAX_DAILY_QUOTA {
                return Err(ValidationError::out_of_range(
                    format!("quota.{}", tier),
                    1,
                    MAX_DAILY_QUOTA as i64,
                    quota as i64,
                ));
            }
        }
        Ok(())
    }

    /// Daily quota for a tier.
    pub fn for_tier(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Free => self.free,
            Tier::Pro => self.pro,
            Tier::Elite => self.elite,
        }
    }
}

impl Default for TierQuotas {
    fn default() -> Self {
        Self {
            free: 3,
            pro: 20,
            elite: 40,
        }
    }
}
