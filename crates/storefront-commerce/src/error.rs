//! Commerce error types.

use crate::checkout::OrderStatus;
use crate::ids::ProductId;
use crate::money::Money;
use thiserror::Error;

/// Errors that can occur in e-commerce operations.
///
/// Every variant is scoped to a single operation; nothing here is fatal to
/// the process. Validation errors are raised before any mutation,
/// business-rule errors before commit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommerceError {
    /// Order placement was attempted with no cart items.
    #[error("cart is empty")]
    EmptyCart,

    /// Product is missing or inactive.
    #[error("product {0} not available")]
    ProductUnavailable(ProductId),

    /// Not enough available stock to cover the requested quantity.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// Order total falls outside the configured bounds.
    #[error("order total {actual} outside allowed range {min}..={max}")]
    OrderAmountOutOfRange {
        min: Money,
        max: Money,
        actual: Money,
    },

    /// A required address field is missing.
    #[error("invalid address: missing {missing}")]
    InvalidAddress { missing: &'static str },

    /// Quantity must be positive.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Cart holds the maximum number of distinct items.
    #[error("cart limit of {max} items exceeded")]
    CartLimitExceeded { max: i64 },

    /// Requested status change is not a legal transition.
    #[error("invalid order status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Arithmetic overflow in a money calculation.
    #[error("arithmetic overflow in money calculation")]
    Overflow,
}
