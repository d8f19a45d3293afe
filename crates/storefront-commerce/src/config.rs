//! Store configuration.
//!
//! An explicit, immutable configuration value passed into pricing and
//! coupon calculations. Defaults carry the reference deployment's values;
//! a TOML file can override them. Unknown keys are rejected.

use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Business-rule configuration for the order core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Tax rate applied to the post-discount, pre-shipping amount.
    pub tax_rate: f64,
    /// Subtotals at or above this threshold ship free.
    pub free_shipping_threshold: Money,
    /// Standard shipping rate.
    pub standard_shipping_cost: Money,
    /// Express shipping rate.
    pub express_shipping_cost: Money,
    /// Minimum allowed order total.
    pub min_order_amount: Money,
    /// Maximum allowed order total.
    pub max_order_amount: Money,
    /// Maximum number of distinct items in a cart.
    pub max_cart_items: i64,
    /// Attempts for a contended write before giving up.
    pub write_retry_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.10,
            free_shipping_threshold: Money::from_dollars(50, 0),
            standard_shipping_cost: Money::from_dollars(5, 0),
            express_shipping_cost: Money::from_dollars(15, 0),
            min_order_amount: Money::from_dollars(1, 0),
            max_order_amount: Money::from_dollars(10_000, 0),
            max_cart_items: 50,
            write_retry_attempts: 3,
        }
    }
}

impl StoreConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = StoreConfig::default();
        assert_eq!(config.free_shipping_threshold, Money::new(5000));
        assert_eq!(config.standard_shipping_cost, Money::new(500));
        assert_eq!(config.express_shipping_cost, Money::new(1500));
        assert!((config.tax_rate - 0.10).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let config = StoreConfig::from_toml_str(
            "tax_rate = 0.08\nmax_cart_items = 20\n",
        )
        .unwrap();
        assert!((config.tax_rate - 0.08).abs() < f64::EPSILON);
        assert_eq!(config.max_cart_items, 20);
        // Untouched keys keep their defaults
        assert_eq!(config.standard_shipping_cost, Money::new(500));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(StoreConfig::from_toml_str("tax_rato = 0.1\n").is_err());
    }
}
