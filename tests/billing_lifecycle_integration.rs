//! Integration tests for the billing lifecycle.
//!
//! Drives signed webhook deliveries through the fully wired handlers over
//! the in-memory adapters and checks the resulting subscription state and
//! effective tier:
//! 1. Redelivery is idempotent
//! 2. Out-of-order deliveries never move state backwards
//! 3. Concurrent deliveries for one account serialize
//! 4. Grants, the expiration sweep and the retry sweep compose with billing

use secrecy::SecretString;
use serde_json::json;
use std::sync::Arc;

use entitlement_engine::adapters::http::{EntitlementAppState, EntitlementSettings, EntitlementStores};
use entitlement_engine::adapters::memory::{
    InMemoryGrantRepository, InMemorySubscriptionRepository, InMemoryTierCache,
    InMemoryWebhookEventRepository,
};
use entitlement_engine::application::handlers::entitlement::{
    BillingWebhookAck, GetEffectiveTierQuery, GrantAccessCommand, HandleBillingWebhookCommand,
    RetryReport,
};
use entitlement_engine::domain::entitlement::{
    sign_payload, EffectiveTier, GrantKind, ProductCatalog, Provenance, SubscriptionRecord,
    SubscriptionStatus, Tier,
};
use entitlement_engine::domain::foundation::{Timestamp, UserId};
use entitlement_engine::ports::{SubscriptionRepository, WebhookEventRepository, WebhookOutcome};

// =============================================================================
// Test Infrastructure
// =============================================================================

const SECRET: &str = "whsec_lifecycle";
const T0_MS: i64 = 1_760_000_000_000;

struct Harness {
    state: EntitlementAppState,
    subscriptions: Arc<InMemorySubscriptionRepository>,
    webhook_events: Arc<InMemoryWebhookEventRepository>,
}

fn harness_with(configure: impl FnOnce(&mut EntitlementSettings)) -> Harness {
    let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
    let webhook_events = Arc::new(InMemoryWebhookEventRepository::new());
    let stores = EntitlementStores {
        subscriptions: subscriptions.clone(),
        grants: Arc::new(InMemoryGrantRepository::new()),
        webhook_events: webhook_events.clone(),
        tier_cache: Arc::new(InMemoryTierCache::new()),
    };

    let mut settings = EntitlementSettings::new(SecretString::new(SECRET.to_string()));
    settings.catalog = ProductCatalog::parse("pro_monthly=pro,elite_monthly=elite").unwrap();
    configure(&mut settings);

    Harness {
        state: EntitlementAppState::new(stores, settings),
        subscriptions,
        webhook_events,
    }
}

fn harness() -> Harness {
    harness_with(|_| {})
}

fn user() -> UserId {
    UserId::new("user-42").unwrap()
}

fn event(id: &str, event_type: &str, offset_ms: i64, product: Option<&str>) -> String {
    json!({
        "event_id": id,
        "event_type": event_type,
        "user_reference": "user-42",
        "product_id": product,
        "event_timestamp_ms": T0_MS + offset_ms,
    })
    .to_string()
}

fn signed(body: &str) -> HandleBillingWebhookCommand {
    let now = chrono::Utc::now().timestamp();
    HandleBillingWebhookCommand {
        payload: body.as_bytes().to_vec(),
        signature: Some(sign_payload(SECRET, now, body.as_bytes())),
    }
}

impl Harness {
    async fn deliver(&self, body: &str) -> BillingWebhookAck {
        self.state.webhook.handle(signed(body)).await.unwrap()
    }

    async fn record(&self) -> SubscriptionRecord {
        self.subscriptions.find_by_user(&user()).await.unwrap().unwrap()
    }

    async fn tier(&self) -> EffectiveTier {
        self.state
            .effective_tier
            .handle(GetEffectiveTierQuery { user_id: user() })
            .await
            .unwrap()
    }
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn redelivered_purchase_is_applied_once() {
    let h = harness();
    let purchase = event("evt_purchase", "INITIAL_PURCHASE", 0, Some("pro_monthly"));

    assert_eq!(h.deliver(&purchase).await, BillingWebhookAck::Processed);
    let after_first = h.record().await;

    assert_eq!(h.deliver(&purchase).await, BillingWebhookAck::AlreadyProcessed);
    assert_eq!(h.deliver(&purchase).await, BillingWebhookAck::AlreadyProcessed);

    assert_eq!(h.record().await, after_first);
    assert_eq!(after_first.version, 1);
    assert_eq!(h.webhook_events.len().await, 1);
    assert_eq!(h.tier().await, EffectiveTier::subscription(Tier::Pro));
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn late_cancellation_does_not_undo_newer_renewal() {
    let h = harness();
    h.deliver(&event("evt_1", "INITIAL_PURCHASE", 0, Some("pro_monthly"))).await;
    h.deliver(&event("evt_3", "RENEWAL", 2_000, Some("pro_monthly"))).await;

    let ack = h.deliver(&event("evt_2", "CANCELLATION", 1_000, None)).await;

    assert_eq!(ack, BillingWebhookAck::Ignored);
    let record = h.record().await;
    assert_eq!(record.status, SubscriptionStatus::Active);
    assert_eq!(record.last_event_id.unwrap().as_str(), "evt_3");
    let stored = h.webhook_events.find_by_event_id("evt_2").await.unwrap().unwrap();
    assert_eq!(stored.outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn refund_after_renewal_drops_to_free() {
    let h = harness();
    h.deliver(&event("evt_1", "INITIAL_PURCHASE", 0, Some("elite_monthly"))).await;
    h.deliver(&event("evt_2", "RENEWAL", 1_000, None)).await;
    assert_eq!(h.tier().await.tier, Tier::Elite);

    h.deliver(&event("evt_3", "REFUND", 2_000, None)).await;

    assert_eq!(h.record().await.status, SubscriptionStatus::Refunded);
    assert_eq!(h.tier().await, EffectiveTier::free());
}

#[tokio::test]
async fn cancellation_keeps_access_until_expiration() {
    let h = harness();
    h.deliver(&event("evt_1", "INITIAL_PURCHASE", 0, Some("pro_monthly"))).await;

    h.deliver(&event("evt_2", "CANCELLATION", 1_000, None)).await;
    assert_eq!(h.record().await.status, SubscriptionStatus::CancelledPendingExpiry);
    assert_eq!(h.tier().await, EffectiveTier::subscription(Tier::Pro));

    h.deliver(&event("evt_3", "EXPIRATION", 2_000, None)).await;
    assert_eq!(h.record().await.status, SubscriptionStatus::Expired);
    assert_eq!(h.tier().await, EffectiveTier::free());
}

#[tokio::test]
async fn unknown_event_type_is_acknowledged_and_ignored() {
    let h = harness();
    h.deliver(&event("evt_1", "INITIAL_PURCHASE", 0, Some("pro_monthly"))).await;

    let ack = h.deliver(&event("evt_2", "SUBSCRIBER_ALIAS", 1_000, None)).await;

    assert_eq!(ack, BillingWebhookAck::Ignored);
    assert_eq!(h.record().await.version, 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_for_one_account_all_apply() {
    let h = harness_with(|settings| settings.max_apply_attempts = 100);
    let bodies: Vec<String> = (0..8)
        .map(|n| event(&format!("evt_{}", n), "RENEWAL", 0, Some("pro_monthly")))
        .collect();

    let acks = futures::future::join_all(bodies.iter().map(|body| h.deliver(body))).await;

    assert!(acks.iter().all(|ack| *ack == BillingWebhookAck::Processed));
    let record = h.record().await;
    assert_eq!(record.version, 8);
    assert_eq!(record.status, SubscriptionStatus::Active);
    assert_eq!(h.webhook_events.len().await, 8);
}

#[tokio::test]
async fn accounts_are_independent() {
    let h = harness();
    h.deliver(&event("evt_1", "INITIAL_PURCHASE", 0, Some("elite_monthly"))).await;

    let other = h
        .state
        .effective_tier
        .handle(GetEffectiveTierQuery {
            user_id: UserId::new("user-7").unwrap(),
        })
        .await
        .unwrap();

    assert_eq!(other, EffectiveTier::free());
}

// =============================================================================
// Grants and Sweeps
// =============================================================================

#[tokio::test]
async fn day_pass_outranks_subscription_until_swept() {
    let h = harness();
    h.deliver(&event("evt_1", "INITIAL_PURCHASE", 0, Some("pro_monthly"))).await;
    h.state
        .grant_access
        .handle(GrantAccessCommand {
            user_id: user(),
            kind: GrantKind::DayPass,
            tier: Tier::Elite,
        })
        .await
        .unwrap();

    let granted = h.tier().await;
    assert_eq!(granted.tier, Tier::Elite);
    assert_eq!(granted.provenance, Provenance::DayPass);

    let report = h
        .state
        .expire_grants
        .handle(Timestamp::now().plus_secs(25 * 3600))
        .await
        .unwrap();

    assert_eq!(report.retired, 1);
    assert_eq!(h.tier().await, EffectiveTier::subscription(Tier::Pro));
}

#[tokio::test]
async fn unmapped_product_fails_and_stays_failed_on_retry() {
    let h = harness();

    let ack = h
        .deliver(&event("evt_1", "INITIAL_PURCHASE", 0, Some("gold_weekly")))
        .await;
    assert_eq!(ack, BillingWebhookAck::Failed);

    let report = h.state.retry_webhooks.handle().await.unwrap();

    assert_eq!(
        report,
        RetryReport {
            retried: 1,
            resolved: 0,
            still_failing: 1
        }
    );
    let stored = h.webhook_events.find_by_event_id("evt_1").await.unwrap().unwrap();
    assert_eq!(stored.outcome, WebhookOutcome::Failed);
    assert_eq!(stored.attempts, 2);
    assert_eq!(h.tier().await, EffectiveTier::free());
}

#[tokio::test]
async fn redelivery_of_failed_event_is_retried_not_skipped() {
    let h = harness();
    let body = event("evt_1", "INITIAL_PURCHASE", 0, Some("gold_weekly"));
    h.deliver(&body).await;

    let ack = h.deliver(&body).await;

    assert_eq!(ack, BillingWebhookAck::Failed);
    let stored = h.webhook_events.find_by_event_id("evt_1").await.unwrap().unwrap();
    assert_eq!(stored.attempts, 2);
}
