//! Subscription record aggregate.
//!
//! One record per account, mirroring the last subscription state the billing
//! provider reported. The provider owns renewal dates; nothing here expires
//! on a local clock.
//!
//! # Ordering
//!
//! Each applied event stamps `last_event_at`. A later delivery carrying an
//! earlier provider timestamp is stale and leaves the record untouched, so a
//! delayed renewal cannot resurrect a subscription a newer cancellation closed.

use serde::{Deserialize, Serialize};

use super::billing_event::{BillingEvent, BillingEventType};
use super::webhook_errors::WebhookError;
use super::{SubscriptionStatus, Tier};
use crate::domain::foundation::{EventId, Timestamp, UserId};

/// Subscription record - the provider's view of one account.
///
/// # Invariants
///
/// - `user_id` is unique (one record per account)
/// - `version` increases by one on every persisted change
/// - `last_event_at` never moves backwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: UserId,
    pub provider_customer_id: Option<String>,

    /// Tier of the subscribed product; absent until the first purchase.
    pub tier: Option<Tier>,
    pub product_id: Option<String>,
    pub status: SubscriptionStatus,

    pub last_event_id: Option<EventId>,
    pub last_event_at: Option<Timestamp>,

    /// Optimistic-concurrency marker.
    pub version: i64,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Result of applying one billing event to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The event was applied. `from == to` when only metadata moved.
    Applied {
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    },
    /// The event id was the last one applied.
    Duplicate,
    /// The event predates the last applied event.
    Stale { last_event_at: Timestamp },
}

impl TransitionOutcome {
    /// True when the record changed and must be persisted.
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

impl SubscriptionRecord {
    /// Creates the empty record every account starts with.
    pub fn new(user_id: UserId, now: Timestamp) -> Self {
        Self {
            user_id,
            provider_customer_id: None,
            tier: None,
            product_id: None,
            status: SubscriptionStatus::None,
            last_event_id: None,
            last_event_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Tier this subscription currently grants, if any.
    pub fn entitled_tier(&self) -> Option<Tier> {
        if self.status.has_access() {
            self.tier
        } else {
            None
        }
    }

    /// Applies a billing event through the transition table.
    ///
    /// | Event            | Status                     | Tier                  |
    /// |------------------|----------------------------|-----------------------|
    /// | InitialPurchase  | Active                     | from event (required) |
    /// | Renewal          | Active                     | changes on plan change|
    /// | Cancellation     | CancelledPendingExpiry     | kept                  |
    /// | Uncancellation   | Active (from cancelled)    | kept                  |
    /// | Expiration       | Expired                    | cleared               |
    /// | BillingIssue     | PastDue                    | kept                  |
    /// | Refund           | Refunded                   | cleared               |
    /// | ProductChange    | unchanged                  | from event (required) |
    ///
    /// # Errors
    ///
    /// - `Ignored` - unknown event type; the record is untouched
    /// - `UnknownProduct` - the event needs a tier and none could be resolved
    pub fn apply(
        &mut self,
        event: &BillingEvent,
        now: Timestamp,
    ) -> Result<TransitionOutcome, WebhookError> {
        if self.last_event_id.as_ref() == Some(&event.id) {
            return Ok(TransitionOutcome::Duplicate);
        }
        if let Some(last_event_at) = self.last_event_at {
            if event.occurred_at < last_event_at {
                return Ok(TransitionOutcome::Stale { last_event_at });
            }
        }

        let from = self.status;
        match &event.event_type {
            BillingEventType::InitialPurchase => {
                let tier = required_tier(event)?;
                self.status = SubscriptionStatus::Active;
                self.tier = Some(tier);
                self.product_id = event.product_id.clone();
            }
            BillingEventType::Renewal => {
                match event.tier {
                    Some(tier) => {
                        self.tier = Some(tier);
                        if event.product_id.is_some() {
                            self.product_id = event.product_id.clone();
                        }
                    }
                    None if self.tier.is_none() => return Err(unknown_product(event)),
                    None => {}
                }
                self.status = SubscriptionStatus::Active;
            }
            BillingEventType::Cancellation => {
                self.status = SubscriptionStatus::CancelledPendingExpiry;
            }
            BillingEventType::Uncancellation => {
                if self.status == SubscriptionStatus::CancelledPendingExpiry {
                    self.status = SubscriptionStatus::Active;
                }
            }
            BillingEventType::Expiration => {
                self.status = SubscriptionStatus::Expired;
                self.tier = None;
            }
            BillingEventType::BillingIssue => {
                self.status = SubscriptionStatus::PastDue;
            }
            BillingEventType::Refund => {
                self.status = SubscriptionStatus::Refunded;
                self.tier = None;
            }
            BillingEventType::ProductChange => {
                let tier = required_tier(event)?;
                self.tier = Some(tier);
                self.product_id = event.product_id.clone();
            }
            BillingEventType::Unknown(raw) => {
                return Err(WebhookError::Ignored(format!(
                    "unhandled event type '{}'",
                    raw
                )));
            }
        }

        if event.customer_id.is_some() {
            self.provider_customer_id = event.customer_id.clone();
        }
        self.last_event_id = Some(event.id.clone());
        self.last_event_at = Some(event.occurred_at);
        self.updated_at = now;

        Ok(TransitionOutcome::Applied {
            from,
            to: self.status,
        })
    }
}

fn required_tier(event: &BillingEvent) -> Result<Tier, WebhookError> {
    event.tier.ok_or_else(|| unknown_product(event))
}

fn unknown_product(event: &BillingEvent) -> WebhookError {
    WebhookError::UnknownProduct(
        event
            .product_id
            .clone()
            .unwrap_or_else(|| "<none>".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::billing_event::BillingEventBuilder;

    fn t(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000 + secs).unwrap()
    }

    fn record() -> SubscriptionRecord {
        SubscriptionRecord::new(UserId::new("user-1").unwrap(), t(0))
    }

    fn event(id: &str, event_type: BillingEventType, at: i64) -> BillingEvent {
        BillingEventBuilder::new()
            .id(id)
            .event_type(event_type)
            .occurred_at(t(at))
            .build()
    }

    fn purchased() -> SubscriptionRecord {
        let mut r = record();
        r.apply(&event("evt_buy", BillingEventType::InitialPurchase, 10), t(10))
            .unwrap();
        r
    }

    // ══════════════════════════════════════════════════════════════
    // Transition Table Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn new_record_grants_nothing() {
        let r = record();
        assert_eq!(r.status, SubscriptionStatus::None);
        assert_eq!(r.entitled_tier(), None);
        assert_eq!(r.version, 0);
    }

    #[test]
    fn initial_purchase_activates_with_event_tier() {
        let mut r = record();
        let outcome = r
            .apply(&event("evt_1", BillingEventType::InitialPurchase, 10), t(11))
            .unwrap();

        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                from: SubscriptionStatus::None,
                to: SubscriptionStatus::Active
            }
        );
        assert_eq!(r.entitled_tier(), Some(Tier::Pro));
        assert_eq!(r.product_id.as_deref(), Some("pro_monthly"));
        assert_eq!(r.last_event_at, Some(t(10)));
        assert_eq!(r.updated_at, t(11));
    }

    #[test]
    fn initial_purchase_without_tier_fails_and_leaves_record_untouched() {
        let mut r = record();
        let before = r.clone();
        let e = BillingEventBuilder::new()
            .product("mystery_pack", None)
            .occurred_at(t(5))
            .build();

        let result = r.apply(&e, t(5));

        assert!(matches!(result, Err(WebhookError::UnknownProduct(p)) if p == "mystery_pack"));
        assert_eq!(r, before);
    }

    #[test]
    fn renewal_keeps_tier_without_plan_change() {
        let mut r = purchased();
        let renewal = BillingEventBuilder::new()
            .id("evt_renew")
            .event_type(BillingEventType::Renewal)
            .no_product()
            .occurred_at(t(20))
            .build();

        r.apply(&renewal, t(20)).unwrap();

        assert_eq!(r.status, SubscriptionStatus::Active);
        assert_eq!(r.tier, Some(Tier::Pro));
    }

    #[test]
    fn renewal_with_new_product_changes_plan() {
        let mut r = purchased();
        let renewal = BillingEventBuilder::new()
            .id("evt_renew")
            .event_type(BillingEventType::Renewal)
            .product("elite_annual", Some(Tier::Elite))
            .occurred_at(t(20))
            .build();

        r.apply(&renewal, t(20)).unwrap();

        assert_eq!(r.tier, Some(Tier::Elite));
        assert_eq!(r.product_id.as_deref(), Some("elite_annual"));
    }

    #[test]
    fn cancellation_keeps_access_until_expiration() {
        let mut r = purchased();
        r.apply(&event("evt_c", BillingEventType::Cancellation, 20), t(20))
            .unwrap();

        assert_eq!(r.status, SubscriptionStatus::CancelledPendingExpiry);
        assert_eq!(r.entitled_tier(), Some(Tier::Pro));

        r.apply(&event("evt_x", BillingEventType::Expiration, 30), t(30))
            .unwrap();
        assert_eq!(r.status, SubscriptionStatus::Expired);
        assert_eq!(r.tier, None);
        assert_eq!(r.entitled_tier(), None);
    }

    #[test]
    fn uncancellation_restores_active_only_from_cancelled() {
        let mut r = purchased();
        r.apply(&event("evt_c", BillingEventType::Cancellation, 20), t(20))
            .unwrap();
        r.apply(&event("evt_u", BillingEventType::Uncancellation, 25), t(25))
            .unwrap();
        assert_eq!(r.status, SubscriptionStatus::Active);

        let mut expired = purchased();
        expired
            .apply(&event("evt_x", BillingEventType::Expiration, 20), t(20))
            .unwrap();
        expired
            .apply(&event("evt_u", BillingEventType::Uncancellation, 25), t(25))
            .unwrap();
        assert_eq!(expired.status, SubscriptionStatus::Expired);
    }

    #[test]
    fn billing_issue_keeps_tier_while_past_due() {
        let mut r = purchased();
        r.apply(&event("evt_b", BillingEventType::BillingIssue, 20), t(20))
            .unwrap();
        assert_eq!(r.status, SubscriptionStatus::PastDue);
        assert_eq!(r.entitled_tier(), Some(Tier::Pro));
    }

    #[test]
    fn refund_revokes_immediately() {
        let mut r = purchased();
        r.apply(&event("evt_r", BillingEventType::Refund, 20), t(20))
            .unwrap();
        assert_eq!(r.status, SubscriptionStatus::Refunded);
        assert_eq!(r.entitled_tier(), None);
    }

    #[test]
    fn product_change_updates_tier_and_keeps_status() {
        let mut r = purchased();
        r.apply(&event("evt_c", BillingEventType::Cancellation, 15), t(15))
            .unwrap();
        let change = BillingEventBuilder::new()
            .id("evt_pc")
            .event_type(BillingEventType::ProductChange)
            .product("elite_annual", Some(Tier::Elite))
            .occurred_at(t(20))
            .build();

        r.apply(&change, t(20)).unwrap();

        assert_eq!(r.status, SubscriptionStatus::CancelledPendingExpiry);
        assert_eq!(r.tier, Some(Tier::Elite));
    }

    #[test]
    fn unknown_event_type_is_ignored_without_mutation() {
        let mut r = purchased();
        let before = r.clone();
        let result = r.apply(
            &event("evt_?", BillingEventType::Unknown("TRANSFER".to_string()), 20),
            t(20),
        );
        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        assert_eq!(r, before);
    }

    // ══════════════════════════════════════════════════════════════
    // Ordering Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn stale_renewal_after_cancellation_is_discarded() {
        let mut r = purchased();
        r.apply(&event("evt_cancel", BillingEventType::Cancellation, 100), t(100))
            .unwrap();

        let outcome = r
            .apply(&event("evt_renew", BillingEventType::Renewal, 50), t(101))
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Stale { last_event_at: t(100) });
        assert_eq!(r.status, SubscriptionStatus::CancelledPendingExpiry);
        assert_eq!(r.last_event_id.as_ref().map(|e| e.as_str()), Some("evt_cancel"));
    }

    #[test]
    fn reapplying_last_event_is_duplicate() {
        let mut r = purchased();
        let before = r.clone();
        let outcome = r
            .apply(&event("evt_buy", BillingEventType::InitialPurchase, 10), t(99))
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Duplicate);
        assert_eq!(r, before);
    }

    #[test]
    fn event_with_equal_timestamp_is_applied() {
        let mut r = purchased();
        let outcome = r
            .apply(&event("evt_same", BillingEventType::BillingIssue, 10), t(10))
            .unwrap();
        assert!(outcome.is_applied());
    }

    // ══════════════════════════════════════════════════════════════
    // Redelivery Properties
    // ══════════════════════════════════════════════════════════════

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use proptest::sample::Index;

        fn event_type() -> impl Strategy<Value = BillingEventType> {
            prop_oneof![
                Just(BillingEventType::InitialPurchase),
                Just(BillingEventType::Renewal),
                Just(BillingEventType::Cancellation),
                Just(BillingEventType::Uncancellation),
                Just(BillingEventType::Expiration),
                Just(BillingEventType::BillingIssue),
                Just(BillingEventType::Refund),
                Just(BillingEventType::ProductChange),
                Just(BillingEventType::Unknown("TRANSFER".to_string())),
            ]
        }

        /// Events in provider order, each carrying a resolvable tier.
        fn ordered_events() -> impl Strategy<Value = Vec<BillingEvent>> {
            prop::collection::vec((event_type(), any::<bool>(), 1i64..100), 1..25).prop_map(
                |specs| {
                    let mut at = 0;
                    specs
                        .into_iter()
                        .enumerate()
                        .map(|(n, (event_type, elite, gap))| {
                            at += gap;
                            let tier = if elite { Tier::Elite } else { Tier::Pro };
                            BillingEventBuilder::new()
                                .id(format!("evt_{}", n))
                                .event_type(event_type)
                                .product(format!("{}_monthly", tier), Some(tier))
                                .occurred_at(t(at))
                                .build()
                        })
                        .collect()
                },
            )
        }

        fn apply_all<'a>(events: impl IntoIterator<Item = &'a BillingEvent>) -> SubscriptionRecord {
            let mut r = record();
            for e in events {
                let _ = r.apply(e, t(0));
            }
            r
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn redelivering_any_event_later_changes_nothing(
                events in ordered_events(),
                replayed in any::<Index>(),
                position in any::<Index>(),
            ) {
                let idx = replayed.index(events.len());
                let insert_at = idx + 1 + position.index(events.len() - idx);
                let mut delivered = events.clone();
                delivered.insert(insert_at, events[idx].clone());

                prop_assert_eq!(apply_all(&delivered), apply_all(&events));
            }

            #[test]
            fn replay_outcome_is_duplicate_or_stale(
                events in ordered_events(),
                replayed in any::<Index>(),
            ) {
                let mut r = apply_all(&events);
                let before = r.clone();
                let idx = replayed.index(events.len());

                let outcome = r.apply(&events[idx], t(0));

                match outcome {
                    Ok(TransitionOutcome::Duplicate) | Ok(TransitionOutcome::Stale { .. }) => {}
                    Err(WebhookError::Ignored(_)) => {}
                    other => prop_assert!(false, "replay produced {:?}", other),
                }
                prop_assert_eq!(r, before);
            }
        }
    }
}
