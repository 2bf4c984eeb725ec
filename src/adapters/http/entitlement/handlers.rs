//! HTTP handlers for entitlement endpoints.
//!
//! These handlers connect Axum routes to the entitlement and allocation
//! command/query handlers.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use secrecy::SecretString;

use crate::application::handlers::allocation::{AllocatePicksCommand, AllocatePicksHandler};
use crate::application::handlers::entitlement::{
    ApplyBillingEventHandler, ClearGrantCommand, ClearGrantHandler, ExpireGrantsHandler,
    GetEffectiveTierHandler, GetEffectiveTierQuery, GrantAccessCommand, GrantAccessHandler,
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, RetryFailedWebhooksHandler,
    SweepReport, DEFAULT_MAX_APPLY_ATTEMPTS, DEFAULT_PROCESSING_BUDGET,
};
use crate::domain::allocation::{ContentItem, Sport};
use crate::domain::entitlement::{
    BillingWebhookVerifier, EntitlementError, GrantKind, IdempotentWebhookProcessor,
    ProductCatalog, Tier, TierQuotas, WebhookError, DEFAULT_TOLERANCE_SECS,
};
use crate::domain::foundation::{DomainError, Timestamp, UserId, ValidationError};
use crate::ports::{GrantRepository, SubscriptionRepository, TierCache, WebhookEventRepository};

use super::dto::{
    AllocatePicksRequest, AllocationResponse, ClearGrantRequest, EffectiveTierResponse,
    ErrorResponse, GrantAccessRequest, WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Storage ports the entitlement endpoints run against.
#[derive(Clone)]
pub struct EntitlementStores {
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub grants: Arc<dyn GrantRepository>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub tier_cache: Arc<dyn TierCache>,
}

/// Tunables for the entitlement handlers.
#[derive(Debug, Clone)]
pub struct EntitlementSettings {
    pub webhook_secret: SecretString,
    pub signature_header: String,
    pub signature_tolerance_secs: i64,
    pub catalog: ProductCatalog,
    pub quotas: TierQuotas,
    pub tier_cache_ttl: Duration,
    pub processing_budget: Duration,
    pub max_apply_attempts: u32,
    pub sweep_batch_size: u32,
    pub sweep_max_batches: u32,
    pub retry_batch_size: u32,
}

impl EntitlementSettings {
    /// Defaults for everything but the signing secret.
    pub fn new(webhook_secret: SecretString) -> Self {
        Self {
            webhook_secret,
            signature_header: "x-billing-signature".to_string(),
            signature_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            catalog: ProductCatalog::default(),
            quotas: TierQuotas::default(),
            tier_cache_ttl: Duration::from_secs(60),
            processing_budget: DEFAULT_PROCESSING_BUDGET,
            max_apply_attempts: DEFAULT_MAX_APPLY_ATTEMPTS,
            sweep_batch_size: 500,
            sweep_max_batches: 20,
            retry_batch_size: 100,
        }
    }
}

/// Shared application state.
///
/// Handlers are built once at startup; cloning the state only bumps the
/// reference counts.
#[derive(Clone)]
pub struct EntitlementAppState {
    pub signature_header: Arc<str>,
    pub webhook: Arc<HandleBillingWebhookHandler>,
    pub grant_access: Arc<GrantAccessHandler>,
    pub clear_grant: Arc<ClearGrantHandler>,
    pub effective_tier: Arc<GetEffectiveTierHandler>,
    pub allocate_picks: Arc<AllocatePicksHandler>,
    pub expire_grants: Arc<ExpireGrantsHandler>,
    pub retry_webhooks: Arc<RetryFailedWebhooksHandler>,
}

impl EntitlementAppState {
    /// Wire every handler against the given stores.
    pub fn new(stores: EntitlementStores, settings: EntitlementSettings) -> Self {
        let apply = Arc::new(
            ApplyBillingEventHandler::new(stores.subscriptions.clone(), stores.tier_cache.clone())
                .with_max_attempts(settings.max_apply_attempts),
        );
        let processor = IdempotentWebhookProcessor::new(stores.webhook_events.clone(), apply);
        let verifier = Arc::new(
            BillingWebhookVerifier::new(settings.webhook_secret)
                .with_tolerance_secs(settings.signature_tolerance_secs),
        );
        let webhook = HandleBillingWebhookHandler::new(
            verifier,
            Arc::new(settings.catalog),
            processor.clone(),
        )
        .with_processing_budget(settings.processing_budget);

        let effective_tier = Arc::new(
            GetEffectiveTierHandler::new(
                stores.subscriptions.clone(),
                stores.grants.clone(),
                stores.tier_cache.clone(),
            )
            .with_cache_ttl(settings.tier_cache_ttl),
        );

        Self {
            signature_header: Arc::from(settings.signature_header.as_str()),
            webhook: Arc::new(webhook),
            grant_access: Arc::new(GrantAccessHandler::new(
                stores.grants.clone(),
                stores.tier_cache.clone(),
            )),
            clear_grant: Arc::new(ClearGrantHandler::new(
                stores.grants.clone(),
                stores.tier_cache.clone(),
            )),
            allocate_picks: Arc::new(AllocatePicksHandler::new(
                effective_tier.clone(),
                settings.quotas,
            )),
            effective_tier,
            expire_grants: Arc::new(
                ExpireGrantsHandler::new(stores.grants, stores.tier_cache)
                    .with_batch_size(settings.sweep_batch_size)
                    .with_max_batches(settings.sweep_max_batches),
            ),
            retry_webhooks: Arc::new(
                RetryFailedWebhooksHandler::new(stores.webhook_events, processor)
                    .with_batch_size(settings.retry_batch_size),
            ),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Endpoint
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/billing - Verify and process a billing-provider event
pub async fn handle_billing_webhook(
    State(state): State<EntitlementAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(state.signature_header.as_ref())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandleBillingWebhookCommand {
        payload: body.to_vec(),
        signature,
    };
    let ack = state.webhook.handle(cmd).await?;

    Ok(Json(WebhookAckResponse::from(ack)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Grant Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /internal/grants - Open (or reset) a 24-hour grant window
pub async fn grant_access(
    State(state): State<EntitlementAppState>,
    payload: Result<Json<GrantAccessRequest>, JsonRejection>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let Json(request) = payload?;
    let cmd = GrantAccessCommand {
        user_id: UserId::new(request.user_id)?,
        kind: GrantKind::from_str(&request.kind)?,
        tier: Tier::from_str(&request.tier)?,
    };
    state.grant_access.handle(cmd).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /internal/grants/clear - Close a grant window early
pub async fn clear_grant(
    State(state): State<EntitlementAppState>,
    payload: Result<Json<ClearGrantRequest>, JsonRejection>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let Json(request) = payload?;
    let cmd = ClearGrantCommand {
        user_id: UserId::new(request.user_id)?,
        kind: GrantKind::from_str(&request.kind)?,
    };
    state.clear_grant.handle(cmd).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /entitlements/:user_id - Resolve an account's tier right now
pub async fn get_effective_tier(
    State(state): State<EntitlementAppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let query = GetEffectiveTierQuery {
        user_id: UserId::new(user_id)?,
    };
    let tier = state.effective_tier.handle(query).await?;

    Ok(Json(EffectiveTierResponse::from(tier)))
}

/// POST /allocations - Select today's picks within the account's quota
pub async fn allocate_picks(
    State(state): State<EntitlementAppState>,
    payload: Result<Json<AllocatePicksRequest>, JsonRejection>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let Json(request) = payload?;
    let sport_preferences = request
        .sport_preferences
        .iter()
        .map(Sport::new)
        .collect::<Result<Vec<_>, _>>()?;
    let candidate_pool = request
        .candidate_pool
        .into_iter()
        .map(|item| {
            ContentItem::new(item.id, Sport::new(item.sport)?, item.category, item.confidence)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cmd = AllocatePicksCommand {
        user_id: UserId::new(request.user_id)?,
        sport_preferences,
        candidate_pool,
    };
    let result = state.allocate_picks.handle(cmd).await?;

    Ok(Json(AllocationResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Maintenance Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /internal/jobs/expire-grants - Run one grant expiration sweep
pub async fn run_expire_grants(
    State(state): State<EntitlementAppState>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let report: SweepReport = state.expire_grants.handle(Timestamp::now()).await?;
    Ok(Json(report))
}

/// POST /internal/jobs/retry-webhooks - Re-drive failed webhook events
pub async fn run_retry_webhooks(
    State(state): State<EntitlementAppState>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let report = state.retry_webhooks.handle().await?;
    Ok(Json(report))
}

/// GET /health - Liveness check
pub async fn health() -> &'static str {
    "ok"
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts entitlement errors to HTTP responses.
#[derive(Debug)]
pub struct EntitlementApiError(EntitlementError);

impl From<EntitlementError> for EntitlementApiError {
    fn from(err: EntitlementError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for EntitlementApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl From<DomainError> for EntitlementApiError {
    fn from(err: DomainError) -> Self {
        Self(err.into())
    }
}

impl From<JsonRejection> for EntitlementApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(EntitlementError::validation("body", rejection.body_text()))
    }
}

impl IntoResponse for EntitlementApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match &self.0 {
            EntitlementError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_details(
                    "VALIDATION_FAILED",
                    message.clone(),
                    serde_json::json!({ "field": field }),
                ),
            ),
            EntitlementError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("STORE_UNAVAILABLE", "Entitlement store is unavailable"),
            ),
            EntitlementError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, status = status.as_u16(), "Entitlement request failed");
        }

        (status, Json(error)).into_response()
    }
}

/// API error type for the webhook endpoint.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let error_code = if self.0.is_authentication_failure() {
            "INVALID_SIGNATURE"
        } else if matches!(self.0, WebhookError::Unrecorded(_)) {
            "STORE_UNAVAILABLE"
        } else {
            "INVALID_PAYLOAD"
        };

        tracing::warn!(error = %self.0, status = status.as_u16(), "Billing webhook rejected");

        (status, Json(ErrorResponse::new(error_code, self.0.to_string()))).into_response()
    }
}
