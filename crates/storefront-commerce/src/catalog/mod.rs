//! Product catalog module.
//!
//! Contains types for products, stock levels, and the reservation
//! accounting that order placement and cancellation drive.

mod product;
mod stock;

pub use product::{NewProduct, Product, ProductCategory, ProductPatch};
pub use stock::{MovementKind, StockLevel, StockMovement};
