//! Billing webhook configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::entitlement::ProductCatalog;

/// Billing-provider webhook configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Shared secret used to sign webhook deliveries
    pub webhook_secret: SecretString,

    /// Header carrying the `t=...,v1=...` signature
    #[serde(default = "default_signature_header")]
    pub signature_header: String,

    /// Product-to-tier mapping, e.g. `pro_monthly=pro,elite_annual=elite`
    #[serde(default)]
    pub product_tiers: String,

    /// How long the webhook endpoint waits for processing before acknowledging
    #[serde(default = "default_processing_budget")]
    pub processing_budget_ms: u64,

    /// Accepted age of a signature timestamp
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,

    /// Compare-and-swap attempts per event before giving up
    #[serde(default = "default_max_apply_attempts")]
    pub max_apply_attempts: u32,
}

impl BillingConfig {
    pub fn processing_budget(&self) -> Duration {
        Duration::from_millis(self.processing_budget_ms)
    }

    /// Parsed product catalog.
    pub fn catalog(&self) -> Result<ProductCatalog, ValidationError> {
        ProductCatalog::parse(&self.product_tiers)
            .map_err(|e| ValidationError::InvalidProductTiers(e.to_string()))
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.webhook_secret.expose_secret().trim().is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__WEBHOOK_SECRET"));
        }
        if self.signature_header.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__SIGNATURE_HEADER"));
        }
        if self.processing_budget_ms == 0 || self.processing_budget_ms > 30_000 {
            return Err(ValidationError::InvalidProcessingBudget);
        }
        if self.signature_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        if self.max_apply_attempts == 0 {
            return Err(ValidationError::InvalidApplyAttempts);
        }
        if self.catalog()?.is_empty() {
            tracing::warn!("No billing products configured; purchases will rely on explicit tiers");
        }
        Ok(())
    }
}

fn default_signature_header() -> String {
    "x-billing-signature".to_string()
}

fn default_processing_budget() -> u64 {
    2_000
}

fn default_signature_tolerance() -> i64 {
    300
}

fn default_max_apply_attempts() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::Tier;

    fn config() -> BillingConfig {
        BillingConfig {
            webhook_secret: SecretString::new("whsec_test".to_string()),
            signature_header: default_signature_header(),
            product_tiers: "pro_monthly=pro,elite_annual=elite".to_string(),
            processing_budget_ms: default_processing_budget(),
            signature_tolerance_secs: default_signature_tolerance(),
            max_apply_attempts: default_max_apply_attempts(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.processing_budget(), Duration::from_secs(2));
    }

    #[test]
    fn test_catalog_maps_products() {
        let catalog = config().catalog().unwrap();
        assert_eq!(catalog.tier_for("elite_annual"), Some(Tier::Elite));
    }

    #[test]
    fn test_blank_secret_rejected() {
        let config = BillingConfig {
            webhook_secret: SecretString::new("  ".to_string()),
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_bad_product_mapping_rejected() {
        let config = BillingConfig {
            product_tiers: "pro_monthly=platinum".to_string(),
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidProductTiers(_))
        ));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let config = BillingConfig {
            processing_budget_ms: 0,
            ..config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_apply_attempts_rejected() {
        let config = BillingConfig {
            max_apply_attempts: 0,
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidApplyAttempts)
        ));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("whsec_test"));
    }
}
