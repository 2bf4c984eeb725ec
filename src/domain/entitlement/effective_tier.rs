//! Resolved tier with provenance.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{GrantKind, Tier};
use crate::domain::foundation::Timestamp;

/// Where an effective tier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    DayPass,
    WelcomeBonus,
    Subscription,
    Free,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::DayPass => "day_pass",
            Provenance::WelcomeBonus => "welcome_bonus",
            Provenance::Subscription => "subscription",
            Provenance::Free => "free",
        }
    }
}

impl From<GrantKind> for Provenance {
    fn from(kind: GrantKind) -> Self {
        match kind {
            GrantKind::DayPass => Provenance::DayPass,
            GrantKind::WelcomeBonus => Provenance::WelcomeBonus,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The tier an account is entitled to right now.
///
/// `expires_at` is set only for grant provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveTier {
    pub tier: Tier,
    pub provenance: Provenance,
    pub expires_at: Option<Timestamp>,
}

impl EffectiveTier {
    pub fn free() -> Self {
        Self {
            tier: Tier::Free,
            provenance: Provenance::Free,
            expires_at: None,
        }
    }

    pub fn subscription(tier: Tier) -> Self {
        Self {
            tier,
            provenance: Provenance::Subscription,
            expires_at: None,
        }
    }

    pub fn granted(kind: GrantKind, tier: Tier, expires_at: Timestamp) -> Self {
        Self {
            tier,
            provenance: kind.into(),
            expires_at: Some(expires_at),
        }
    }
}
