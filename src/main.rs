//! entitlement-engine - HTTP service entry point.
//!
//! Loads configuration, wires storage (Postgres or in-memory) and the tier
//! cache (Redis or in-process), starts the maintenance scheduler, and serves
//! the entitlement API until SIGINT/SIGTERM.

use std::sync::Arc;

use axum::http::HeaderValue;
use sqlx::PgPool;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use entitlement_engine::adapters::http::{
    entitlement_router, EntitlementAppState, EntitlementSettings, EntitlementStores,
};
use entitlement_engine::adapters::memory::{
    InMemoryGrantRepository, InMemorySubscriptionRepository, InMemoryTierCache,
    InMemoryWebhookEventRepository,
};
use entitlement_engine::adapters::postgres::{
    PostgresGrantRepository, PostgresSubscriptionRepository, PostgresWebhookEventRepository,
};
use entitlement_engine::adapters::redis::RedisTierCache;
use entitlement_engine::adapters::scheduler::{MaintenanceScheduler, MaintenanceSchedulerConfig};
use entitlement_engine::config::{AppConfig, ConfigError, DatabaseConfig, RedisConfig};
use entitlement_engine::ports::TierCache;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    tracing::info!(
        environment = ?config.server.environment,
        postgres = config.database.is_some(),
        redis = config.redis.is_some(),
        "Starting entitlement-engine"
    );

    let tier_cache = build_tier_cache(config.redis.as_ref()).await?;
    let stores = build_stores(config.database.as_ref(), tier_cache).await?;
    let state = EntitlementAppState::new(stores, settings_from_config(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = if config.scheduler.enabled {
        let scheduler = MaintenanceScheduler::with_config(
            state.expire_grants.clone(),
            state.retry_webhooks.clone(),
            MaintenanceSchedulerConfig::default()
                .with_sweep_interval(config.scheduler.sweep_interval())
                .with_sweep_hour_utc(config.scheduler.sweep_hour_utc)
                .with_webhook_retry_interval(config.scheduler.webhook_retry_interval()),
        );
        Some(tokio::spawn(async move { scheduler.run(shutdown_rx).await }))
    } else {
        tracing::info!("Maintenance scheduler disabled");
        None
    };

    let app = entitlement_router()
        .with_state(state)
        .layer(cors_layer(&config.server.cors_origins_list()))
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Maintenance scheduler task failed");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn settings_from_config(config: &AppConfig) -> Result<EntitlementSettings, ConfigError> {
    let billing = &config.billing;
    let mut settings = EntitlementSettings::new(billing.webhook_secret.clone());
    settings.signature_header = billing.signature_header.clone();
    settings.signature_tolerance_secs = billing.signature_tolerance_secs;
    settings.catalog = billing.catalog()?;
    settings.processing_budget = billing.processing_budget();
    settings.max_apply_attempts = billing.max_apply_attempts;
    settings.quotas = config.entitlements.quotas()?;
    settings.tier_cache_ttl = config.entitlements.tier_cache_ttl();
    settings.sweep_batch_size = config.scheduler.sweep_batch_size;
    settings.sweep_max_batches = config.scheduler.sweep_max_batches;
    settings.retry_batch_size = config.scheduler.webhook_retry_batch_size;
    Ok(settings)
}

/// Postgres repositories when configured, in-memory otherwise.
async fn build_stores(
    database: Option<&DatabaseConfig>,
    tier_cache: Arc<dyn TierCache>,
) -> Result<EntitlementStores, BoxError> {
    let Some(database) = database else {
        tracing::warn!("No database configured, using in-memory stores");
        return Ok(EntitlementStores {
            subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
            grants: Arc::new(InMemoryGrantRepository::new()),
            webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
            tier_cache,
        });
    };

    let pool: PgPool = database.pool_options().connect(&database.url).await?;
    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(EntitlementStores {
        subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        grants: Arc::new(PostgresGrantRepository::new(pool.clone())),
        webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool)),
        tier_cache,
    })
}

async fn build_tier_cache(
    redis_config: Option<&RedisConfig>,
) -> Result<Arc<dyn TierCache>, BoxError> {
    let Some(redis_config) = redis_config else {
        tracing::info!("No Redis configured, using in-process tier cache");
        return Ok(Arc::new(InMemoryTierCache::new()));
    };

    let client = redis::Client::open(redis_config.url.as_str())?;
    let conn = tokio::time::timeout(
        redis_config.connect_timeout(),
        client.get_multiplexed_async_connection(),
    )
    .await
    .map_err(|_| "timed out connecting to Redis")??;

    Ok(Arc::new(
        RedisTierCache::new(conn, redis_config.key_prefix.clone())
            .with_generation_ttl(redis_config.generation_ttl()),
    ))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        CorsLayer::new()
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
