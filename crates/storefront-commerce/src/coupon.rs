//! Coupon engine: code validation and discount calculation.

use crate::config::StoreConfig;
use crate::ids::{CouponId, ProductId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of discount a coupon grants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DiscountKind {
    /// Percentage off the order amount (0.0 - 100.0).
    Percentage(f64),
    /// Fixed amount off, capped at the order amount.
    Fixed(Money),
    /// Waives the standard shipping cost.
    FreeShipping,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage(_) => "percentage",
            DiscountKind::Fixed(_) => "fixed",
            DiscountKind::FreeShipping => "free_shipping",
        }
    }
}

/// A coupon definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    /// Unique coupon identifier.
    pub id: CouponId,
    /// Coupon code (unique, e.g. "SAVE20").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Discount kind and value.
    pub kind: DiscountKind,
    /// Minimum order amount to qualify.
    pub minimum_order_amount: Money,
    /// Cap on percentage discounts.
    pub maximum_discount: Option<Money>,
    /// Total redemptions allowed (None = unlimited).
    pub max_uses: Option<i64>,
    /// Redemptions so far.
    pub current_uses: i64,
    /// Redemptions allowed per user.
    pub max_uses_per_user: i64,
    /// Minimum number of items in the order.
    pub minimum_items: i64,
    /// Maximum number of items in the order.
    pub maximum_items: Option<i64>,
    /// Start of the validity window.
    pub valid_from: DateTime<Utc>,
    /// End of the validity window.
    pub valid_until: DateTime<Utc>,
    /// Whether the coupon is enabled.
    pub is_active: bool,
    /// When set, at least one order product must be in this list.
    pub applicable_products: Vec<ProductId>,
    /// When set, no order product may be in this list.
    pub excluded_products: Vec<ProductId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Why a coupon was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CouponRejection {
    #[error("coupon is not active")]
    Inactive,

    #[error("coupon is not valid at this time")]
    OutsideValidityWindow,

    #[error("order must be at least {minimum}")]
    BelowMinimumAmount { minimum: Money },

    #[error("at least {minimum} items required")]
    TooFewItems { minimum: i64 },

    #[error("at most {maximum} items allowed")]
    TooManyItems { maximum: i64 },

    #[error("coupon usage limit reached")]
    UsageLimitReached,

    #[error("coupon usage limit reached for user")]
    UserLimitReached,

    #[error("coupon not applicable to selected products")]
    ProductsNotApplicable,

    #[error("coupon not applicable to selected products")]
    ProductExcluded,
}

/// Everything about the prospective redemption the engine needs.
#[derive(Debug, Clone)]
pub struct RedemptionContext<'a> {
    /// Order subtotal the coupon would apply to.
    pub order_amount: Money,
    /// Total item quantity in the order.
    pub item_count: i64,
    /// Products in the order.
    pub product_ids: &'a [ProductId],
    /// How many times this user has already redeemed the coupon, when the
    /// caller is known.
    pub user_prior_uses: Option<i64>,
}

impl Coupon {
    /// Validate the coupon against a prospective redemption.
    ///
    /// Checks run in a fixed order and short-circuit on the first failure:
    /// active flag, validity window, minimum amount, item-count bounds,
    /// global usage cap, per-user cap, product lists.
    pub fn validate(
        &self,
        ctx: &RedemptionContext<'_>,
        now: DateTime<Utc>,
    ) -> Result<(), CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }

        if now < self.valid_from || now > self.valid_until {
            return Err(CouponRejection::OutsideValidityWindow);
        }

        if ctx.order_amount < self.minimum_order_amount {
            return Err(CouponRejection::BelowMinimumAmount {
                minimum: self.minimum_order_amount,
            });
        }

        if ctx.item_count < self.minimum_items {
            return Err(CouponRejection::TooFewItems {
                minimum: self.minimum_items,
            });
        }
        if let Some(maximum) = self.maximum_items {
            if ctx.item_count > maximum {
                return Err(CouponRejection::TooManyItems { maximum });
            }
        }

        if let Some(max_uses) = self.max_uses {
            if self.current_uses >= max_uses {
                return Err(CouponRejection::UsageLimitReached);
            }
        }

        if let Some(prior) = ctx.user_prior_uses {
            if prior >= self.max_uses_per_user {
                return Err(CouponRejection::UserLimitReached);
            }
        }

        if !ctx.product_ids.is_empty() {
            if !self.applicable_products.is_empty()
                && !ctx
                    .product_ids
                    .iter()
                    .any(|pid| self.applicable_products.contains(pid))
            {
                return Err(CouponRejection::ProductsNotApplicable);
            }
            if !self.excluded_products.is_empty()
                && ctx
                    .product_ids
                    .iter()
                    .any(|pid| self.excluded_products.contains(pid))
            {
                return Err(CouponRejection::ProductExcluded);
            }
        }

        Ok(())
    }

    /// Calculate the discount for an order amount.
    ///
    /// Free-shipping coupons are worth the configured standard shipping
    /// cost, a fixed external value not derived from the order.
    pub fn discount_amount(&self, order_amount: Money, config: &StoreConfig) -> Money {
        match self.kind {
            DiscountKind::Percentage(percent) => {
                let discount = order_amount.percentage(percent);
                match self.maximum_discount {
                    Some(cap) => discount.min(cap),
                    None => discount,
                }
            }
            DiscountKind::Fixed(amount) => amount.min(order_amount),
            DiscountKind::FreeShipping => config.standard_shipping_cost,
        }
    }

    /// Check if the global usage cap is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.max_uses
            .map(|limit| self.current_uses >= limit)
            .unwrap_or(false)
    }
}

/// Fields required to create a coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub name: String,
    pub kind: DiscountKind,
    pub minimum_order_amount: Money,
    pub maximum_discount: Option<Money>,
    pub max_uses: Option<i64>,
    pub max_uses_per_user: i64,
    pub minimum_items: i64,
    pub maximum_items: Option<i64>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub applicable_products: Vec<ProductId>,
    pub excluded_products: Vec<ProductId>,
}

impl NewCoupon {
    /// A coupon valid over the given window with no restrictions beyond a
    /// minimum order amount.
    pub fn simple(
        code: impl Into<String>,
        name: impl Into<String>,
        kind: DiscountKind,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
            minimum_order_amount: Money::ZERO,
            maximum_discount: None,
            max_uses: None,
            max_uses_per_user: 1,
            minimum_items: 1,
            maximum_items: None,
            valid_from,
            valid_until,
            applicable_products: Vec::new(),
            excluded_products: Vec::new(),
        }
    }
}

/// Result of a standalone coupon validation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CouponValidation {
    /// Whether the coupon can be applied.
    pub valid: bool,
    /// Discount the coupon would grant.
    pub discount_amount: Money,
    /// Rejection reason when not valid.
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(kind: DiscountKind) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "TEST".to_string(),
            name: "Test Coupon".to_string(),
            kind,
            minimum_order_amount: Money::ZERO,
            maximum_discount: None,
            max_uses: None,
            current_uses: 0,
            max_uses_per_user: 1,
            minimum_items: 1,
            maximum_items: None,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            is_active: true,
            applicable_products: Vec::new(),
            excluded_products: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ctx(order_amount: Money, item_count: i64) -> RedemptionContext<'static> {
        RedemptionContext {
            order_amount,
            item_count,
            product_ids: &[],
            user_prior_uses: None,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let c = coupon(DiscountKind::Percentage(10.0));
        let config = StoreConfig::default();
        assert_eq!(
            c.discount_amount(Money::new(10000), &config),
            Money::new(1000)
        );
    }

    #[test]
    fn test_percentage_discount_capped() {
        // SAVE20: 20%, max discount $200. On a $2000 order the discount is
        // $200, not $400.
        let mut c = coupon(DiscountKind::Percentage(20.0));
        c.code = "SAVE20".to_string();
        c.minimum_order_amount = Money::from_dollars(100, 0);
        c.maximum_discount = Some(Money::from_dollars(200, 0));
        let config = StoreConfig::default();
        assert_eq!(
            c.discount_amount(Money::from_dollars(2000, 0), &config),
            Money::from_dollars(200, 0)
        );
    }

    #[test]
    fn test_fixed_discount_capped_at_order_amount() {
        let c = coupon(DiscountKind::Fixed(Money::new(10000)));
        let config = StoreConfig::default();
        assert_eq!(
            c.discount_amount(Money::new(5000), &config),
            Money::new(5000)
        );
        assert_eq!(
            c.discount_amount(Money::new(20000), &config),
            Money::new(10000)
        );
    }

    #[test]
    fn test_free_shipping_worth_standard_rate() {
        let c = coupon(DiscountKind::FreeShipping);
        let config = StoreConfig::default();
        assert_eq!(
            c.discount_amount(Money::new(20000), &config),
            config.standard_shipping_cost
        );
    }

    #[test]
    fn test_inactive_rejected_first() {
        let mut c = coupon(DiscountKind::Percentage(10.0));
        c.is_active = false;
        // Would also fail the window check; the active flag wins.
        c.valid_until = c.valid_from;
        assert_eq!(
            c.validate(&ctx(Money::new(1000), 1), Utc::now()),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn test_validity_window() {
        let c = coupon(DiscountKind::Percentage(10.0));
        let before = c.valid_from - Duration::hours(1);
        let after = c.valid_until + Duration::hours(1);
        assert_eq!(
            c.validate(&ctx(Money::new(1000), 1), before),
            Err(CouponRejection::OutsideValidityWindow)
        );
        assert_eq!(
            c.validate(&ctx(Money::new(1000), 1), after),
            Err(CouponRejection::OutsideValidityWindow)
        );
        assert!(c.validate(&ctx(Money::new(1000), 1), Utc::now()).is_ok());
    }

    #[test]
    fn test_minimum_order_amount() {
        let mut c = coupon(DiscountKind::Percentage(10.0));
        c.minimum_order_amount = Money::from_dollars(50, 0);
        assert_eq!(
            c.validate(&ctx(Money::from_dollars(49, 99), 1), Utc::now()),
            Err(CouponRejection::BelowMinimumAmount {
                minimum: Money::from_dollars(50, 0)
            })
        );
        assert!(c
            .validate(&ctx(Money::from_dollars(50, 0), 1), Utc::now())
            .is_ok());
    }

    #[test]
    fn test_item_count_bounds() {
        let mut c = coupon(DiscountKind::Percentage(10.0));
        c.minimum_items = 2;
        c.maximum_items = Some(5);
        assert_eq!(
            c.validate(&ctx(Money::new(1000), 1), Utc::now()),
            Err(CouponRejection::TooFewItems { minimum: 2 })
        );
        assert_eq!(
            c.validate(&ctx(Money::new(1000), 6), Utc::now()),
            Err(CouponRejection::TooManyItems { maximum: 5 })
        );
        assert!(c.validate(&ctx(Money::new(1000), 3), Utc::now()).is_ok());
    }

    #[test]
    fn test_usage_caps() {
        let mut c = coupon(DiscountKind::Percentage(10.0));
        c.max_uses = Some(5);
        c.current_uses = 5;
        assert_eq!(
            c.validate(&ctx(Money::new(1000), 1), Utc::now()),
            Err(CouponRejection::UsageLimitReached)
        );
        assert!(c.is_exhausted());

        c.current_uses = 4;
        let mut with_user = ctx(Money::new(1000), 1);
        with_user.user_prior_uses = Some(1);
        assert_eq!(
            c.validate(&with_user, Utc::now()),
            Err(CouponRejection::UserLimitReached)
        );
    }

    #[test]
    fn test_product_lists() {
        let mut c = coupon(DiscountKind::Percentage(10.0));
        c.applicable_products = vec![ProductId::new(1), ProductId::new(2)];

        let in_cart = [ProductId::new(2), ProductId::new(9)];
        let mut context = ctx(Money::new(1000), 1);
        context.product_ids = &in_cart;
        assert!(c.validate(&context, Utc::now()).is_ok());

        let not_applicable = [ProductId::new(9)];
        context.product_ids = &not_applicable;
        assert_eq!(
            c.validate(&context, Utc::now()),
            Err(CouponRejection::ProductsNotApplicable)
        );

        c.applicable_products.clear();
        c.excluded_products = vec![ProductId::new(9)];
        let excluded = [ProductId::new(1), ProductId::new(9)];
        context.product_ids = &excluded;
        assert_eq!(
            c.validate(&context, Utc::now()),
            Err(CouponRejection::ProductExcluded)
        );
    }
}
