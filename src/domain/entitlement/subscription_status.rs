//! Subscription status as reported by the billing provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Lifecycle status of the provider-managed subscription.
///
/// The provider is authoritative; this is the last state it told us about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Account exists but never purchased.
    #[default]
    None,

    /// Paid and renewing.
    Active,

    /// Auto-renew turned off. Access continues until the provider
    /// sends the expiration.
    CancelledPendingExpiry,

    /// Renewal charge failed. Provider is retrying; access continues.
    PastDue,

    /// Subscription ended. No access.
    Expired,

    /// Purchase refunded. Access revoked immediately.
    Refunded,
}

impl SubscriptionStatus {
    /// Returns true if this status grants the subscription's tier.
    ///
    /// Access is granted for:
    /// - Active
    /// - CancelledPendingExpiry: until the provider's expiration arrives
    /// - PastDue: during the provider's billing retry
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active
                | SubscriptionStatus::CancelledPendingExpiry
                | SubscriptionStatus::PastDue
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::CancelledPendingExpiry => "cancelled_pending_expiry",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SubscriptionStatus::None),
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled_pending_expiry" => Ok(SubscriptionStatus::CancelledPendingExpiry),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "expired" => Ok(SubscriptionStatus::Expired),
            "refunded" => Ok(SubscriptionStatus::Refunded),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_granting_statuses() {
        assert!(SubscriptionStatus::Active.has_access());
        assert!(SubscriptionStatus::CancelledPendingExpiry.has_access());
        assert!(SubscriptionStatus::PastDue.has_access());
    }

    #[test]
    fn access_denying_statuses() {
        assert!(!SubscriptionStatus::None.has_access());
        assert!(!SubscriptionStatus::Expired.has_access());
        assert!(!SubscriptionStatus::Refunded.has_access());
    }

    #[test]
    fn default_is_none() {
        assert_eq!(SubscriptionStatus::default(), SubscriptionStatus::None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SubscriptionStatus::CancelledPendingExpiry).unwrap();
        assert_eq!(json, "\"cancelled_pending_expiry\"");
    }

    #[test]
    fn storage_string_round_trips() {
        for status in [
            SubscriptionStatus::None,
            SubscriptionStatus::Active,
            SubscriptionStatus::CancelledPendingExpiry,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().unwrap(), status);
        }
    }
}
