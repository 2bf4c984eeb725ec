//! HTTP DTOs for entitlement endpoints.
//!
//! Request bodies carry raw strings; conversion into domain types happens in
//! the handlers so that invalid values surface as our own 400 body.

use serde::{Deserialize, Serialize};

use crate::application::handlers::allocation::AllocatePicksResult;
use crate::application::handlers::entitlement::BillingWebhookAck;
use crate::domain::allocation::{ContentItem, PickCategory};
use crate::domain::entitlement::{EffectiveTier, Provenance, Tier};
use crate::domain::foundation::Timestamp;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to open a grant window.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantAccessRequest {
    pub user_id: String,
    /// `day_pass` or `welcome_bonus`.
    pub kind: String,
    /// `pro` or `elite`.
    pub tier: String,
}

/// Request to close a grant window early.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearGrantRequest {
    pub user_id: String,
    pub kind: String,
}

/// One candidate pick.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateItemRequest {
    pub id: String,
    pub sport: String,
    pub category: PickCategory,
    pub confidence: f64,
}

/// Request to allocate today's picks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatePicksRequest {
    pub user_id: String,
    #[serde(default)]
    pub sport_preferences: Vec<String>,
    #[serde(default)]
    pub candidate_pool: Vec<CandidateItemRequest>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Acknowledgement returned to the billing provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAckResponse {
    pub status: String,
}

impl From<BillingWebhookAck> for WebhookAckResponse {
    fn from(ack: BillingWebhookAck) -> Self {
        Self {
            status: ack.as_str().to_string(),
        }
    }
}

/// An account's effective tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveTierResponse {
    pub effective_tier: Tier,
    pub provenance: Provenance,
    pub expires_at: Option<Timestamp>,
}

impl From<EffectiveTier> for EffectiveTierResponse {
    fn from(tier: EffectiveTier) -> Self {
        Self {
            effective_tier: tier.tier,
            provenance: tier.provenance,
            expires_at: tier.expires_at,
        }
    }
}

/// Today's allocated picks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResponse {
    pub selected_items: Vec<ContentItem>,
    pub fallback_used: bool,
    pub fallback_sports: Vec<String>,
    pub fallback_notice: Option<String>,
    pub quota: u32,
    pub effective_tier: Tier,
}

impl From<AllocatePicksResult> for AllocationResponse {
    fn from(result: AllocatePicksResult) -> Self {
        let fallback_notice = result.allocation.fallback_notice();
        Self {
            fallback_used: result.allocation.fallback_used,
            fallback_sports: result
                .allocation
                .fallback_sports
                .into_iter()
                .map(String::from)
                .collect(),
            fallback_notice,
            selected_items: result.allocation.selected,
            quota: result.quota,
            effective_tier: result.effective_tier.tier,
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}
