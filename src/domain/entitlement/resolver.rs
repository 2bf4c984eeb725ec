//! Entitlement resolution.
//!
//! Pure function of the stored facts and the current time. Priority is fixed:
//!
//! 1. live day pass
//! 2. live welcome bonus
//! 3. subscription in an access-granting status
//! 4. free
//!
//! A grant that has lapsed is skipped even if the sweeper has not retired it
//! yet, so expiry takes effect at read time.

use super::{EffectiveTier, GrantKind, GrantWindow, SubscriptionRecord};
use crate::domain::foundation::Timestamp;

const GRANT_PRIORITY: [GrantKind; 2] = [GrantKind::DayPass, GrantKind::WelcomeBonus];

/// Resolves the effective tier of one account at `now`.
pub fn resolve(
    subscription: Option<&SubscriptionRecord>,
    grants: &[GrantWindow],
    now: Timestamp,
) -> EffectiveTier {
    for kind in GRANT_PRIORITY {
        if let Some(window) = grants
            .iter()
            .find(|g| g.kind == kind && g.is_live(now))
        {
            return EffectiveTier::granted(kind, window.tier, window.expires_at);
        }
    }

    subscription
        .and_then(SubscriptionRecord::entitled_tier)
        .map(EffectiveTier::subscription)
        .unwrap_or_else(EffectiveTier::free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::{Provenance, SubscriptionStatus, Tier};
    use crate::domain::foundation::UserId;

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000).unwrap()
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn grant(kind: GrantKind, tier: Tier, granted_secs_ago: i64) -> GrantWindow {
        GrantWindow::issue(user(), kind, tier, now().minus_secs(granted_secs_ago))
    }

    fn subscription(status: SubscriptionStatus, tier: Option<Tier>) -> SubscriptionRecord {
        let mut record = SubscriptionRecord::new(user(), now());
        record.status = status;
        record.tier = tier;
        record
    }

    #[test]
    fn no_facts_resolves_to_free() {
        let resolved = resolve(None, &[], now());
        assert_eq!(resolved, EffectiveTier::free());
    }

    #[test]
    fn day_pass_beats_everything() {
        let sub = subscription(SubscriptionStatus::Active, Some(Tier::Elite));
        let grants = vec![
            grant(GrantKind::WelcomeBonus, Tier::Elite, 60),
            grant(GrantKind::DayPass, Tier::Pro, 60),
        ];

        let resolved = resolve(Some(&sub), &grants, now());

        assert_eq!(resolved.provenance, Provenance::DayPass);
        assert_eq!(resolved.tier, Tier::Pro);
        assert_eq!(resolved.expires_at, Some(grants[1].expires_at));
    }

    #[test]
    fn welcome_bonus_beats_subscription() {
        let sub = subscription(SubscriptionStatus::Active, Some(Tier::Pro));
        let grants = vec![grant(GrantKind::WelcomeBonus, Tier::Elite, 60)];

        let resolved = resolve(Some(&sub), &grants, now());

        assert_eq!(resolved.provenance, Provenance::WelcomeBonus);
        assert_eq!(resolved.tier, Tier::Elite);
    }

    #[test]
    fn expired_grant_falls_through_to_subscription() {
        let sub = subscription(SubscriptionStatus::Active, Some(Tier::Pro));
        let lapsed = grant(GrantKind::DayPass, Tier::Elite, 25 * 3600);
        assert!(lapsed.active);

        let resolved = resolve(Some(&sub), &[lapsed], now());

        assert_eq!(resolved, EffectiveTier::subscription(Tier::Pro));
    }

    #[test]
    fn grant_expiring_exactly_now_is_not_selected() {
        let at_edge = grant(GrantKind::DayPass, Tier::Elite, 24 * 3600);
        assert_eq!(at_edge.expires_at, now());

        assert_eq!(resolve(None, &[at_edge], now()), EffectiveTier::free());
    }

    #[test]
    fn cleared_grant_is_ignored() {
        let mut cleared = grant(GrantKind::DayPass, Tier::Elite, 60);
        cleared.clear(now());
        assert_eq!(resolve(None, &[cleared], now()), EffectiveTier::free());
    }

    #[test]
    fn access_granting_statuses_yield_subscription_tier() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::CancelledPendingExpiry,
            SubscriptionStatus::PastDue,
        ] {
            let sub = subscription(status, Some(Tier::Elite));
            assert_eq!(
                resolve(Some(&sub), &[], now()),
                EffectiveTier::subscription(Tier::Elite),
                "status {:?}",
                status
            );
        }
    }

    #[test]
    fn lapsed_statuses_yield_free() {
        for status in [
            SubscriptionStatus::None,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Refunded,
        ] {
            let sub = subscription(status, Some(Tier::Elite));
            assert_eq!(resolve(Some(&sub), &[], now()), EffectiveTier::free());
        }
    }
}
