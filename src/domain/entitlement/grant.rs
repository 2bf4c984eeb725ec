//! Time-boxed grant windows.
//!
//! A grant gives an account a tier for a fixed 24 hours. There is at most one
//! window per (account, kind); granting again overwrites the window rather
//! than extending it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Tier;
use crate::domain::foundation::{Timestamp, UserId, ValidationError};

/// Length of every grant window.
pub const GRANT_WINDOW_HOURS: i64 = 24;

/// Kind of time-boxed grant. Declaration order is resolution priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    DayPass,
    WelcomeBonus,
}

impl GrantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantKind::DayPass => "day_pass",
            GrantKind::WelcomeBonus => "welcome_bonus",
        }
    }
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GrantKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day_pass" => Ok(GrantKind::DayPass),
            "welcome_bonus" => Ok(GrantKind::WelcomeBonus),
            other => Err(ValidationError::invalid_format(
                "kind",
                format!("unknown grant kind '{}'", other),
            )),
        }
    }
}

/// A 24-hour grant of a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantWindow {
    pub user_id: UserId,
    pub kind: GrantKind,
    pub tier: Tier,
    pub granted_at: Timestamp,
    pub expires_at: Timestamp,
    pub active: bool,
    pub cleared_at: Option<Timestamp>,
}

impl GrantWindow {
    /// Opens a fresh window starting at `now`.
    pub fn issue(user_id: UserId, kind: GrantKind, tier: Tier, now: Timestamp) -> Self {
        Self {
            user_id,
            kind,
            tier,
            granted_at: now,
            expires_at: now.plus_hours(GRANT_WINDOW_HOURS),
            active: true,
            cleared_at: None,
        }
    }

    /// A window counts only while active and strictly before its expiry.
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.active && now < self.expires_at
    }

    /// Active but past expiry; the sweeper's target.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.active && self.expires_at <= now
    }

    /// Deactivates the window, keeping it for audit.
    ///
    /// Returns false if it was already inactive.
    pub fn clear(&mut self, now: Timestamp) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.cleared_at = Some(now);
        true
    }
}
