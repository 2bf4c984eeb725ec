//! MaintenanceScheduler - Background loop for periodic entitlement jobs.
//!
//! Runs two jobs:
//! - the grant expiration sweep, either every `sweep_interval` (first run at
//!   startup) or once a day at a fixed UTC hour;
//! - the failed-webhook retry sweep, every `webhook_retry_interval`.
//!
//! Job failures are logged and the loop keeps going. Both jobs are safe to
//! run on several instances at once.
//!
//! ## Graceful Shutdown
//!
//! The loop exits when the shutdown channel flips to `true` or its sender is
//! dropped. A job already in progress finishes first.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::application::handlers::entitlement::{
    ExpireGrantsHandler, RetryFailedWebhooksHandler, RetryReport, SweepReport,
};
use crate::domain::foundation::Timestamp;

/// Configuration for the MaintenanceScheduler.
#[derive(Debug, Clone)]
pub struct MaintenanceSchedulerConfig {
    /// Time between expiration sweeps when no fixed hour is set.
    pub sweep_interval: Duration,

    /// Run the expiration sweep daily at this UTC hour instead.
    pub sweep_hour_utc: Option<u32>,

    /// Time between webhook retry sweeps.
    pub webhook_retry_interval: Duration,
}

impl Default for MaintenanceSchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(24 * 3600),
            sweep_hour_utc: None,
            webhook_retry_interval: Duration::from_secs(300),
        }
    }
}

impl MaintenanceSchedulerConfig {
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_sweep_hour_utc(mut self, hour: Option<u32>) -> Self {
        self.sweep_hour_utc = hour;
        self
    }

    pub fn with_webhook_retry_interval(mut self, interval: Duration) -> Self {
        self.webhook_retry_interval = interval;
        self
    }
}

/// Time from `now` until the next `hour:00:00` UTC, strictly in the future.
pub fn next_run_delay(now: DateTime<Utc>, hour: u32) -> Duration {
    let today = now
        .date_naive()
        .and_hms_opt(hour.min(23), 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive));

    let next = match today {
        Some(at) if at > now => at,
        Some(at) => at + ChronoDuration::days(1),
        None => now + ChronoDuration::days(1),
    };

    (next - now).to_std().unwrap_or(Duration::ZERO)
}

pub struct MaintenanceScheduler {
    expire_grants: Arc<ExpireGrantsHandler>,
    retry_webhooks: Arc<RetryFailedWebhooksHandler>,
    config: MaintenanceSchedulerConfig,
}

impl MaintenanceScheduler {
    pub fn new(
        expire_grants: Arc<ExpireGrantsHandler>,
        retry_webhooks: Arc<RetryFailedWebhooksHandler>,
    ) -> Self {
        Self::with_config(
            expire_grants,
            retry_webhooks,
            MaintenanceSchedulerConfig::default(),
        )
    }

    pub fn with_config(
        expire_grants: Arc<ExpireGrantsHandler>,
        retry_webhooks: Arc<RetryFailedWebhooksHandler>,
        config: MaintenanceSchedulerConfig,
    ) -> Self {
        Self {
            expire_grants,
            retry_webhooks,
            config,
        }
    }

    fn sweep_delay(&self, first_run: bool) -> Duration {
        match self.config.sweep_hour_utc {
            Some(hour) => next_run_delay(Utc::now(), hour),
            None if first_run => Duration::ZERO,
            None => self.config.sweep_interval,
        }
    }

    /// Run the scheduler loop until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut next_sweep = Instant::now() + self.sweep_delay(true);
        let mut retry_tick = time::interval(self.config.webhook_retry_interval);
        retry_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            sweep_hour_utc = ?self.config.sweep_hour_utc,
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            webhook_retry_interval_secs = self.config.webhook_retry_interval.as_secs(),
            "Maintenance scheduler started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Maintenance scheduler stopping");
                        return;
                    }
                }

                _ = time::sleep_until(next_sweep) => {
                    self.sweep_once().await;
                    next_sweep = Instant::now() + self.sweep_delay(false);
                }

                _ = retry_tick.tick() => {
                    self.retry_once().await;
                }
            }
        }
    }

    /// Run one expiration sweep, logging instead of failing.
    pub async fn sweep_once(&self) -> Option<SweepReport> {
        match self.expire_grants.handle(Timestamp::now()).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Grant expiration sweep failed");
                None
            }
        }
    }

    /// Run one webhook retry sweep, logging instead of failing.
    pub async fn retry_once(&self) -> Option<RetryReport> {
        match self.retry_webhooks.handle().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Webhook retry sweep failed");
                None
            }
        }
    }
}
