//! SQLite persistence and transactional services for the storefront.
//!
//! [`Store`] wraps one connection and exposes the catalog, cart, coupon
//! and order operations. Business rules live in `storefront-commerce`;
//! this crate supplies durability and the atomicity guarantees around
//! order placement, cancellation and fulfillment.
//!
//! Writes that touch more than one row run inside immediate transactions
//! with a bounded retry on lock contention, so two connections hammering
//! the same product can never oversell it.

mod carts;
mod coupons;
mod error;
mod orders;
mod products;
mod schema;
mod store;

pub use error::StoreError;
pub use orders::PlaceOrderRequest;
pub use store::Store;
