//! Billing-provider webhook event types.
//!
//! `BillingWebhookPayload` is the wire shape; `BillingEvent` is the
//! validated form the state machine consumes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::product_catalog::ProductCatalog;
use super::webhook_errors::WebhookError;
use super::Tier;
use crate::domain::foundation::{EventId, Timestamp, UserId};

/// Billing webhook body as delivered by the provider.
///
/// Fields beyond these are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingWebhookPayload {
    #[serde(default)]
    pub event_id: String,

    #[serde(default, alias = "type")]
    pub event_type: String,

    /// The account identifier supplied to the provider at purchase time.
    #[serde(default, alias = "app_user_id")]
    pub user_reference: String,

    #[serde(default)]
    pub product_id: Option<String>,

    /// Explicit tier; takes precedence over the product catalog.
    #[serde(default)]
    pub tier: Option<String>,

    #[serde(default)]
    pub customer_id: Option<String>,

    /// Provider-side time of the event, Unix milliseconds.
    #[serde(default)]
    pub event_timestamp_ms: Option<i64>,
}

/// Known billing event types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum BillingEventType {
    InitialPurchase,
    Renewal,
    Cancellation,
    Uncancellation,
    Expiration,
    BillingIssue,
    Refund,
    ProductChange,
    /// Unrecognized type, kept verbatim for the audit record.
    Unknown(String),
}

impl BillingEventType {
    /// Parse event type from string.
    ///
    /// Case-insensitive; `-` and `_` are interchangeable.
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "INITIAL_PURCHASE" => Self::InitialPurchase,
            "RENEWAL" => Self::Renewal,
            "CANCELLATION" => Self::Cancellation,
            "UNCANCELLATION" => Self::Uncancellation,
            "EXPIRATION" => Self::Expiration,
            "BILLING_ISSUE" | "FAIL_TO_RENEW" => Self::BillingIssue,
            "REFUND" => Self::Refund,
            "PRODUCT_CHANGE" => Self::ProductChange,
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Canonical wire string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::InitialPurchase => "INITIAL_PURCHASE",
            Self::Renewal => "RENEWAL",
            Self::Cancellation => "CANCELLATION",
            Self::Uncancellation => "UNCANCELLATION",
            Self::Expiration => "EXPIRATION",
            Self::BillingIssue => "BILLING_ISSUE",
            Self::Refund => "REFUND",
            Self::ProductChange => "PRODUCT_CHANGE",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for BillingEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for BillingEventType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<BillingEventType> for String {
    fn from(t: BillingEventType) -> Self {
        t.as_str().to_string()
    }
}

/// A verified, validated billing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingEvent {
    pub id: EventId,
    pub event_type: BillingEventType,
    pub user_id: UserId,
    pub product_id: Option<String>,
    /// Tier the event's product unlocks, when it could be determined.
    pub tier: Option<Tier>,
    pub customer_id: Option<String>,
    /// Provider-side event time; used to discard stale deliveries.
    pub occurred_at: Timestamp,
}

impl BillingEvent {
    /// Validates a wire payload and resolves its tier.
    ///
    /// A missing provider timestamp falls back to `received_at`.
    ///
    /// # Errors
    ///
    /// - `MissingField` - blank `event_id`, `event_type` or `user_reference`
    /// - `ParseError` - explicit tier is not a known tier
    /// - `InvalidTimestamp` - event timestamp out of representable range
    pub fn from_payload(
        payload: BillingWebhookPayload,
        catalog: &ProductCatalog,
        received_at: Timestamp,
    ) -> Result<Self, WebhookError> {
        let id = EventId::new(payload.event_id).map_err(|_| WebhookError::MissingField("event_id"))?;
        if payload.event_type.trim().is_empty() {
            return Err(WebhookError::MissingField("event_type"));
        }
        let user_id = UserId::new(payload.user_reference)
            .map_err(|_| WebhookError::MissingField("user_reference"))?;

        let product_id = payload
            .product_id
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let tier = match payload.tier.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(raw) => Some(
                raw.parse::<Tier>()
                    .map_err(|e| WebhookError::ParseError(e.to_string()))?,
            ),
            None => product_id.as_deref().and_then(|p| catalog.tier_for(p)),
        };

        let occurred_at = match payload.event_timestamp_ms {
            Some(ms) => Timestamp::from_unix_millis(ms).ok_or(WebhookError::InvalidTimestamp)?,
            None => received_at,
        };

        Ok(Self {
            id,
            event_type: BillingEventType::parse(&payload.event_type),
            user_id,
            product_id,
            tier,
            customer_id: payload.customer_id.filter(|c| !c.trim().is_empty()),
            occurred_at,
        })
    }
}

/// Builder for creating test BillingEvent instances.
#[cfg(test)]
pub struct BillingEventBuilder {
    id: String,
    event_type: BillingEventType,
    user_id: String,
    product_id: Option<String>,
    tier: Option<Tier>,
    occurred_at: Timestamp,
}

#[cfg(test)]
impl Default for BillingEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_1".to_string(),
            event_type: BillingEventType::InitialPurchase,
            user_id: "user-1".to_string(),
            product_id: Some("pro_monthly".to_string()),
            tier: Some(Tier::Pro),
            occurred_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
impl BillingEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: BillingEventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn product(mut self, product_id: impl Into<String>, tier: Option<Tier>) -> Self {
        self.product_id = Some(product_id.into());
        self.tier = tier;
        self
    }

    pub fn no_product(mut self) -> Self {
        self.product_id = None;
        self.tier = None;
        self
    }

    pub fn occurred_at(mut self, at: Timestamp) -> Self {
        self.occurred_at = at;
        self
    }

    pub fn build(self) -> BillingEvent {
        BillingEvent {
            id: EventId::new(self.id).unwrap(),
            event_type: self.event_type,
            user_id: UserId::new(self.user_id).unwrap(),
            product_id: self.product_id,
            tier: self.tier,
            customer_id: None,
            occurred_at: self.occurred_at,
        }
    }
}
