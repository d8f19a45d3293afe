//! Order pricing.
//!
//! Calculation order is fixed: discount applies to the subtotal, shipping
//! is decided on the pre-discount subtotal, tax applies to the discounted
//! amount, and the grand total is checked against the configured bounds.

use crate::checkout::ShippingMethod;
use crate::config::StoreConfig;
use crate::error::CommerceError;
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Pricing breakdown for an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderTotals {
    /// Sum of line totals before any adjustment.
    pub subtotal: Money,
    /// Coupon discount actually applied.
    pub discount_total: Money,
    /// Shipping charge.
    pub shipping_total: Money,
    /// Tax on the discounted amount.
    pub tax_total: Money,
    /// What the customer pays.
    pub grand_total: Money,
}

impl OrderTotals {
    /// Compute the full breakdown.
    ///
    /// The discount is clamped to the subtotal, so the taxable amount never
    /// goes negative. Fails when the grand total falls outside the
    /// configured order-amount bounds.
    pub fn compute(
        subtotal: Money,
        discount: Money,
        shipping_method: ShippingMethod,
        config: &StoreConfig,
    ) -> Result<Self, CommerceError> {
        let discount_total = discount.min(subtotal).max(Money::ZERO);
        let shipping_total = shipping_rate(subtotal, shipping_method, config);

        let discounted = subtotal
            .checked_sub(discount_total)
            .ok_or(CommerceError::Overflow)?;
        let tax_total = discounted.multiply_rate(config.tax_rate);

        let grand_total = discounted
            .checked_add(shipping_total)
            .and_then(|t| t.checked_add(tax_total))
            .ok_or(CommerceError::Overflow)?;

        if grand_total < config.min_order_amount || grand_total > config.max_order_amount {
            return Err(CommerceError::OrderAmountOutOfRange {
                min: config.min_order_amount,
                max: config.max_order_amount,
                actual: grand_total,
            });
        }

        Ok(Self {
            subtotal,
            discount_total,
            shipping_total,
            tax_total,
            grand_total,
        })
    }
}

/// Shipping charge for a subtotal and method.
///
/// Orders at or above the free-shipping threshold ship free regardless of
/// method. Below it, express costs the express rate and every other method
/// the standard rate.
pub fn shipping_rate(subtotal: Money, method: ShippingMethod, config: &StoreConfig) -> Money {
    if subtotal >= config.free_shipping_threshold {
        return Money::ZERO;
    }
    match method {
        ShippingMethod::Express => config.express_shipping_cost,
        _ => config.standard_shipping_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_breakdown() {
        // $130 order with a 10% coupon: discount $13, free shipping,
        // tax $11.70 on $117, total $128.70.
        let config = StoreConfig::default();
        let subtotal = Money::from_dollars(130, 0);
        let discount = subtotal.percentage(10.0);

        let totals =
            OrderTotals::compute(subtotal, discount, ShippingMethod::Standard, &config).unwrap();
        assert_eq!(totals.discount_total, Money::from_dollars(13, 0));
        assert_eq!(totals.shipping_total, Money::ZERO);
        assert_eq!(totals.tax_total, Money::from_dollars(11, 70));
        assert_eq!(totals.grand_total, Money::from_dollars(128, 70));
    }

    #[test]
    fn test_shipping_below_threshold() {
        let config = StoreConfig::default();
        let subtotal = Money::from_dollars(30, 0);
        assert_eq!(
            shipping_rate(subtotal, ShippingMethod::Standard, &config),
            Money::from_dollars(5, 0)
        );
        assert_eq!(
            shipping_rate(subtotal, ShippingMethod::Express, &config),
            Money::from_dollars(15, 0)
        );
        // Non-express methods all take the standard rate
        assert_eq!(
            shipping_rate(subtotal, ShippingMethod::Overnight, &config),
            Money::from_dollars(5, 0)
        );
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let config = StoreConfig::default();
        let subtotal = config.free_shipping_threshold;
        assert_eq!(
            shipping_rate(subtotal, ShippingMethod::Express, &config),
            Money::ZERO
        );
    }

    #[test]
    fn test_tax_applies_after_discount() {
        let config = StoreConfig::default();
        let totals = OrderTotals::compute(
            Money::from_dollars(100, 0),
            Money::from_dollars(20, 0),
            ShippingMethod::Standard,
            &config,
        )
        .unwrap();
        // Tax is 10% of $80, not $100
        assert_eq!(totals.tax_total, Money::from_dollars(8, 0));
        assert_eq!(totals.grand_total, Money::from_dollars(88, 0));
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let config = StoreConfig::default();
        let totals = OrderTotals::compute(
            Money::from_dollars(60, 0),
            Money::from_dollars(75, 0),
            ShippingMethod::Standard,
            &config,
        );
        // $0 after discount lands below the $1 minimum
        assert!(matches!(
            totals,
            Err(CommerceError::OrderAmountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_bounds_enforced() {
        let mut config = StoreConfig::default();
        config.standard_shipping_cost = Money::ZERO;
        let too_small = OrderTotals::compute(
            Money::new(50),
            Money::ZERO,
            ShippingMethod::Pickup,
            &config,
        );
        assert!(matches!(
            too_small,
            Err(CommerceError::OrderAmountOutOfRange { .. })
        ));

        let too_large = OrderTotals::compute(
            Money::from_dollars(20_000, 0),
            Money::ZERO,
            ShippingMethod::Standard,
            &config,
        );
        assert!(matches!(
            too_large,
            Err(CommerceError::OrderAmountOutOfRange { .. })
        ));
    }
}
