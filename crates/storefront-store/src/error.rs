//! Store error types.

use storefront_commerce::checkout::OrderStatus;
use storefront_commerce::{CommerceError, OrderId, ProductId};
use thiserror::Error;

/// Errors raised by the persistence layer and the transactional service.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Business-rule violation.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// A contended write kept losing the race and ran out of retries.
    #[error("write contention persisted after {attempts} attempts")]
    ConcurrentModification { attempts: u32 },

    /// Order does not exist or is not visible to the caller.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Coupon code does not exist.
    #[error("coupon {0:?} not found")]
    CouponNotFound(String),

    /// SKU already in use by another product.
    #[error("sku {0:?} already exists")]
    DuplicateSku(String),

    /// Coupon code already in use.
    #[error("coupon code {0:?} already exists")]
    DuplicateCouponCode(String),

    /// Order is not in a refund-eligible state.
    #[error("order {order} in status {status} is not eligible for refund")]
    NotRefundEligible { order: OrderId, status: OrderStatus },

    /// Stored value failed to decode.
    #[error("corrupt stored value: {0}")]
    Decode(String),

    /// JSON column failed to serialize or deserialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if the error is a transient SQLite busy/locked condition
    /// worth retrying.
    pub fn is_busy(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
