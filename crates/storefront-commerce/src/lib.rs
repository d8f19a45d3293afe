//! E-commerce domain types and logic for the storefront order core.
//!
//! This crate holds the pure business rules behind order placement:
//!
//! - **Catalog**: products, stock levels, reservation accounting
//! - **Cart**: per-user cart items awaiting checkout
//! - **Coupon**: code validation and discount calculation
//! - **Checkout**: addresses, pricing breakdown, orders, lifecycle
//!
//! Nothing here performs I/O. Persistence and transactional execution live
//! in `storefront-store`, which drives these types inside a unit of work.
//!
//! # Example
//!
//! ```rust
//! use storefront_commerce::prelude::*;
//!
//! let config = StoreConfig::default();
//! let subtotal = Money::from_dollars(130, 0);
//! let discount = subtotal.percentage(10.0);
//!
//! let totals =
//!     OrderTotals::compute(subtotal, discount, ShippingMethod::Standard, &config).unwrap();
//! assert_eq!(totals.grand_total, Money::new(12870));
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod coupon;
pub mod error;
pub mod ids;
pub mod money;

pub use config::StoreConfig;
pub use error::CommerceError;
pub use ids::*;
pub use money::Money;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::money::Money;

    // Catalog
    pub use crate::catalog::{
        MovementKind, NewProduct, Product, ProductCategory, ProductPatch, StockLevel,
        StockMovement,
    };

    // Cart
    pub use crate::cart::CartItem;

    // Coupon
    pub use crate::coupon::{
        Coupon, CouponRejection, CouponValidation, DiscountKind, NewCoupon, RedemptionContext,
    };

    // Checkout
    pub use crate::checkout::{
        Address, Order, OrderItem, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus,
        ShippingMethod,
    };
}
