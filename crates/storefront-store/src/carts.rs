//! Cart persistence.
//!
//! Carts check stock loosely on add (good UX, no reservation); the hard
//! guarantee happens at order placement.

use crate::error::StoreError;
use crate::products::bad_column;
use crate::store::Store;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use storefront_commerce::cart::CartItem;
use storefront_commerce::{CartItemId, CommerceError, ProductId, UserId};
use tracing::info;

fn cart_item_from_row(row: &Row<'_>) -> rusqlite::Result<CartItem> {
    let options_raw: Option<String> = row.get(4)?;
    let selected_options: BTreeMap<String, String> = match options_raw {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| bad_column(4, format!("bad cart options: {e}")))?,
        None => BTreeMap::new(),
    };
    Ok(CartItem {
        id: CartItemId::new(row.get(0)?),
        user_id: UserId::new(row.get(1)?),
        product_id: ProductId::new(row.get(2)?),
        quantity: row.get(3)?,
        selected_options,
        added_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Load a user's cart, oldest item first. Shared with order placement,
/// which re-reads the cart inside its transaction.
pub(crate) fn cart_items_for_user(
    conn: &Connection,
    user_id: UserId,
) -> Result<Vec<CartItem>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, product_id, quantity, selected_options, added_at, updated_at
         FROM cart_items WHERE user_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![user_id.get()], cart_item_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

impl Store {
    /// Add a product to the cart, merging quantities when the product is
    /// already there. Options on a merge replace the stored ones.
    pub fn add_to_cart(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
        options: &BTreeMap<String, String>,
    ) -> Result<CartItem, StoreError> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity).into());
        }
        let options_json = if options.is_empty() {
            None
        } else {
            Some(serde_json::to_string(options)?)
        };

        let item = self.with_immediate_tx(move |tx, config| {
            let product = tx
                .query_row(
                    "SELECT is_active, stock_on_hand - stock_reserved
                     FROM products WHERE id = ?1",
                    params![product_id.get()],
                    |row| Ok((row.get::<_, bool>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            let (is_active, available) = match product {
                Some(p) => p,
                None => return Err(CommerceError::ProductUnavailable(product_id).into()),
            };
            if !is_active {
                return Err(CommerceError::ProductUnavailable(product_id).into());
            }

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT quantity FROM cart_items WHERE user_id = ?1 AND product_id = ?2",
                    params![user_id.get(), product_id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            let requested = existing.unwrap_or(0) + quantity;
            if requested > available {
                return Err(CommerceError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                }
                .into());
            }

            if existing.is_none() {
                let distinct: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM cart_items WHERE user_id = ?1",
                    params![user_id.get()],
                    |row| row.get(0),
                )?;
                if distinct >= config.max_cart_items {
                    return Err(CommerceError::CartLimitExceeded {
                        max: config.max_cart_items,
                    }
                    .into());
                }
            }

            let now = Utc::now();
            tx.execute(
                "INSERT INTO cart_items
                     (user_id, product_id, quantity, selected_options, added_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (user_id, product_id) DO UPDATE SET
                     quantity = quantity + excluded.quantity,
                     selected_options = excluded.selected_options,
                     updated_at = excluded.updated_at",
                params![
                    user_id.get(),
                    product_id.get(),
                    quantity,
                    options_json,
                    now,
                ],
            )?;
            tx.query_row(
                "SELECT id, user_id, product_id, quantity, selected_options, added_at, updated_at
                 FROM cart_items WHERE user_id = ?1 AND product_id = ?2",
                params![user_id.get(), product_id.get()],
                cart_item_from_row,
            )
            .map_err(StoreError::from)
        })?;
        info!(user_id = %user_id, product_id = %product_id, quantity = item.quantity, "cart updated");
        Ok(item)
    }

    /// Set the quantity of a cart line. Removing is a separate operation.
    pub fn update_cart_item(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartItem, StoreError> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity).into());
        }
        self.with_immediate_tx(move |tx, _config| {
            let available: i64 = tx
                .query_row(
                    "SELECT stock_on_hand - stock_reserved FROM products WHERE id = ?1",
                    params![product_id.get()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(CommerceError::ProductUnavailable(product_id))?;
            if quantity > available {
                return Err(CommerceError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available,
                }
                .into());
            }

            let changed = tx.execute(
                "UPDATE cart_items SET quantity = ?3, updated_at = ?4
                 WHERE user_id = ?1 AND product_id = ?2",
                params![user_id.get(), product_id.get(), quantity, Utc::now()],
            )?;
            if changed == 0 {
                return Err(CommerceError::ProductUnavailable(product_id).into());
            }
            tx.query_row(
                "SELECT id, user_id, product_id, quantity, selected_options, added_at, updated_at
                 FROM cart_items WHERE user_id = ?1 AND product_id = ?2",
                params![user_id.get(), product_id.get()],
                cart_item_from_row,
            )
            .map_err(StoreError::from)
        })
    }

    /// Remove a product from the cart. Removing something absent is a
    /// no-op.
    pub fn remove_from_cart(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM cart_items WHERE user_id = ?1 AND product_id = ?2",
            params![user_id.get(), product_id.get()],
        )?;
        Ok(())
    }

    /// Empty the cart.
    pub fn clear_cart(&mut self, user_id: UserId) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM cart_items WHERE user_id = ?1",
            params![user_id.get()],
        )?;
        Ok(())
    }

    /// The user's cart, oldest item first.
    pub fn cart(&self, user_id: UserId) -> Result<Vec<CartItem>, StoreError> {
        cart_items_for_user(&self.conn, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_commerce::catalog::{NewProduct, ProductCategory};
    use storefront_commerce::{Money, StoreConfig};

    fn store() -> Store {
        Store::open_in_memory(StoreConfig::default()).unwrap()
    }

    fn seed_product(store: &mut Store, sku: &str, stock: i64) -> ProductId {
        store
            .create_product(&NewProduct {
                sku: sku.to_string(),
                name: format!("Product {sku}"),
                description: None,
                category: ProductCategory::Electronics,
                price: Money::new(1000),
                sale_price: None,
                stock_on_hand: stock,
                thumbnail: None,
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_add_merges_quantity() {
        let mut store = store();
        let user = UserId::new(1);
        let product = seed_product(&mut store, "SKU-1", 10);

        store
            .add_to_cart(user, product, 2, &BTreeMap::new())
            .unwrap();
        let item = store
            .add_to_cart(user, product, 3, &BTreeMap::new())
            .unwrap();
        assert_eq!(item.quantity, 5);
        assert_eq!(store.cart(user).unwrap().len(), 1);
    }

    #[test]
    fn test_add_checks_stock() {
        let mut store = store();
        let user = UserId::new(1);
        let product = seed_product(&mut store, "SKU-1", 3);

        store
            .add_to_cart(user, product, 2, &BTreeMap::new())
            .unwrap();
        let err = store.add_to_cart(user, product, 2, &BTreeMap::new());
        assert!(matches!(
            err,
            Err(StoreError::Commerce(CommerceError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }))
        ));
    }

    #[test]
    fn test_add_rejects_inactive_product() {
        let mut store = store();
        let user = UserId::new(1);
        let product = seed_product(&mut store, "SKU-1", 5);
        store
            .update_product(
                product,
                &storefront_commerce::catalog::ProductPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        let err = store.add_to_cart(user, product, 1, &BTreeMap::new());
        assert!(matches!(
            err,
            Err(StoreError::Commerce(CommerceError::ProductUnavailable(_)))
        ));
    }

    #[test]
    fn test_cart_item_limit() {
        let config = StoreConfig {
            max_cart_items: 2,
            ..Default::default()
        };
        let mut store = Store::open_in_memory(config).unwrap();
        let user = UserId::new(1);
        let a = seed_product(&mut store, "SKU-A", 5);
        let b = seed_product(&mut store, "SKU-B", 5);
        let c = seed_product(&mut store, "SKU-C", 5);

        store.add_to_cart(user, a, 1, &BTreeMap::new()).unwrap();
        store.add_to_cart(user, b, 1, &BTreeMap::new()).unwrap();
        let err = store.add_to_cart(user, c, 1, &BTreeMap::new());
        assert!(matches!(
            err,
            Err(StoreError::Commerce(CommerceError::CartLimitExceeded { max: 2 }))
        ));
        // Merging into an existing line is still allowed
        assert!(store.add_to_cart(user, a, 1, &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_update_and_remove() {
        let mut store = store();
        let user = UserId::new(1);
        let product = seed_product(&mut store, "SKU-1", 10);

        store
            .add_to_cart(user, product, 2, &BTreeMap::new())
            .unwrap();
        let item = store.update_cart_item(user, product, 7).unwrap();
        assert_eq!(item.quantity, 7);

        assert!(matches!(
            store.update_cart_item(user, product, 0),
            Err(StoreError::Commerce(CommerceError::InvalidQuantity(0)))
        ));

        store.remove_from_cart(user, product).unwrap();
        assert!(store.cart(user).unwrap().is_empty());
        // Removing again is a no-op
        store.remove_from_cart(user, product).unwrap();
    }

    #[test]
    fn test_options_round_trip() {
        let mut store = store();
        let user = UserId::new(1);
        let product = seed_product(&mut store, "SKU-1", 10);

        let mut options = BTreeMap::new();
        options.insert("color".to_string(), "red".to_string());
        let item = store.add_to_cart(user, product, 1, &options).unwrap();
        assert_eq!(item.selected_options, options);
    }
}
