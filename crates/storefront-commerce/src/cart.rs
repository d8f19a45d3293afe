//! Cart item types.
//!
//! A cart is the set of `CartItem` rows for one user, keyed by
//! `(user_id, product_id)`. Cart items are ephemeral: created on
//! add-to-cart, destroyed on order placement or explicit removal. They do
//! not own stock; reservation happens at order time.

use crate::ids::{CartItemId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An item in a user's cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartItem {
    /// Unique cart item identifier.
    pub id: CartItemId,
    /// Owning user.
    pub user_id: UserId,
    /// Product in the cart.
    pub product_id: ProductId,
    /// Quantity.
    pub quantity: i64,
    /// Selected options (e.g. color, size).
    pub selected_options: BTreeMap<String, String>,
    /// When the item was added.
    pub added_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Total quantity across a set of cart items.
pub fn total_quantity(items: &[CartItem]) -> i64 {
    items.iter().map(|i| i.quantity).sum()
}
