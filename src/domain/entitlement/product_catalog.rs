//! Mapping from billing-provider product identifiers to tiers.

use std::collections::HashMap;

use super::Tier;
use crate::domain::foundation::ValidationError;

/// Known products and the tier each one unlocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductCatalog {
    products: HashMap<String, Tier>,
}

impl ProductCatalog {
    pub fn new(products: HashMap<String, Tier>) -> Self {
        Self { products }
    }

    /// Parses `product=tier` pairs separated by commas,
    /// e.g. `pro_monthly=pro,elite_annual=elite`.
    pub fn parse(entries: &str) -> Result<Self, ValidationError> {
        let mut products = HashMap::new();
        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (product, tier) = entry.split_once('=').ok_or_else(|| {
                ValidationError::invalid_format(
                    "billing.product_tiers",
                    format!("expected product=tier, got '{}'", entry),
                )
            })?;
            let product = product.trim();
            if product.is_empty() {
                return Err(ValidationError::empty_field("billing.product_tiers"));
            }
            products.insert(product.to_string(), tier.parse::<Tier>()?);
        }
        Ok(Self { products })
    }

    /// Tier unlocked by a product, if the product is known.
    pub fn tier_for(&self, product_id: &str) -> Option<Tier> {
        self.products.get(product_id).copied()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_product_tier_pairs() {
        let catalog = ProductCatalog::parse("pro_monthly=pro, elite_annual=ELITE").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.tier_for("pro_monthly"), Some(Tier::Pro));
        assert_eq!(catalog.tier_for("elite_annual"), Some(Tier::Elite));
        assert_eq!(catalog.tier_for("unknown"), None);
    }

    #[test]
    fn empty_input_yields_empty_catalog() {
        let catalog = ProductCatalog::parse("  ").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn entry_without_separator_is_rejected() {
        assert!(ProductCatalog::parse("pro_monthly").is_err());
    }

    #[test]
    fn unknown_tier_is_rejected() {
        assert!(ProductCatalog::parse("gold=platinum").is_err());
    }
}
