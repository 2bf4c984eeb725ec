//! Background job schedule configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Schedule for the grant expiration sweep and the webhook retry sweep
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Run background jobs in this process
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between expiration sweeps when no fixed hour is set
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Run the expiration sweep once a day at this UTC hour
    pub sweep_hour_utc: Option<u32>,

    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u32,

    #[serde(default = "default_sweep_max_batches")]
    pub sweep_max_batches: u32,

    /// Seconds between webhook retry sweeps
    #[serde(default = "default_webhook_retry_interval")]
    pub webhook_retry_interval_secs: u64,

    #[serde(default = "default_webhook_retry_batch_size")]
    pub webhook_retry_batch_size: u32,
}

impl SchedulerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn webhook_retry_interval(&self) -> Duration {
        Duration::from_secs(self.webhook_retry_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidSchedule("sweep_interval_secs"));
        }
        if matches!(self.sweep_hour_utc, Some(hour) if hour > 23) {
            return Err(ValidationError::InvalidSchedule("sweep_hour_utc"));
        }
        if self.sweep_batch_size == 0 {
            return Err(ValidationError::InvalidSchedule("sweep_batch_size"));
        }
        if self.sweep_max_batches == 0 {
            return Err(ValidationError::InvalidSchedule("sweep_max_batches"));
        }
        if self.webhook_retry_interval_secs == 0 {
            return Err(ValidationError::InvalidSchedule("webhook_retry_interval_secs"));
        }
        if self.webhook_retry_batch_size == 0 {
            return Err(ValidationError::InvalidSchedule("webhook_retry_batch_size"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_hour_utc: None,
            sweep_batch_size: default_sweep_batch_size(),
            sweep_max_batches: default_sweep_max_batches(),
            webhook_retry_interval_secs: default_webhook_retry_interval(),
            webhook_retry_batch_size: default_webhook_retry_batch_size(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    86_400
}

fn default_sweep_batch_size() -> u32 {
    500
}

fn default_sweep_max_batches() -> u32 {
    20
}

fn default_webhook_retry_interval() -> u64 {
    300
}

fn default_webhook_retry_batch_size() -> u32 {
    100
}
