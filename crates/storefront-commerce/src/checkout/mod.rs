//! Checkout module.
//!
//! Addresses, the order pricing breakdown, and the order lifecycle.

mod address;
mod order;
mod pricing;

pub use address::Address;
pub use order::{
    generate_order_number, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
    ShippingMethod,
};
pub use pricing::OrderTotals;
