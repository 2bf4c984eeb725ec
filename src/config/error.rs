//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid billing product mapping: {0}")]
    InvalidProductTiers(String),

    #[error("Webhook processing budget must be between 1ms and 30s")]
    InvalidProcessingBudget,

    #[error("Signature tolerance must be positive")]
    InvalidSignatureTolerance,

    #[error("max_apply_attempts must be at least 1")]
    InvalidApplyAttempts,

    #[error("Invalid tier quota: {0}")]
    InvalidQuota(String),

    #[error("Invalid scheduler setting: {0}")]
    InvalidSchedule(&'static str),

    #[error("Invalid tier cache setting: {0}")]
    InvalidCacheSetting(&'static str),
}
