//! Product catalog persistence.

use crate::error::StoreError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use storefront_commerce::catalog::{
    MovementKind, NewProduct, Product, ProductCategory, ProductPatch, StockLevel, StockMovement,
};
use storefront_commerce::{Money, ProductId};
use tracing::info;

const PRODUCT_COLUMNS: &str = "id, sku, name, description, category, price_cents, \
     sale_price_cents, stock_on_hand, stock_reserved, is_active, thumbnail, \
     created_at, updated_at";

pub(crate) fn bad_column(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

pub(crate) fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let category_raw: String = row.get(4)?;
    let category = ProductCategory::parse(&category_raw)
        .ok_or_else(|| bad_column(4, format!("unknown product category {category_raw:?}")))?;
    Ok(Product {
        id: ProductId::new(row.get(0)?),
        sku: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category,
        price: Money::new(row.get(5)?),
        sale_price: row.get::<_, Option<i64>>(6)?.map(Money::new),
        stock: StockLevel {
            on_hand: row.get(7)?,
            reserved: row.get(8)?,
        },
        is_active: row.get(9)?,
        thumbnail: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Append a row to the stock movement audit trail.
pub(crate) fn record_movement(
    tx: &Transaction<'_>,
    product_id: ProductId,
    kind: MovementKind,
    quantity: i64,
    reference: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO stock_movements (product_id, kind, quantity, reference, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![product_id.get(), kind.as_str(), quantity, reference, now],
    )?;
    Ok(())
}

fn product_by_id(conn: &Connection, id: ProductId) -> Result<Product, StoreError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    conn.query_row(&sql, params![id.get()], product_from_row)
        .optional()?
        .ok_or(StoreError::ProductNotFound(id))
}

fn is_sku_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("products.sku")
    )
}

impl Store {
    /// Create a product. The SKU must be unique.
    pub fn create_product(&mut self, new: &NewProduct) -> Result<Product, StoreError> {
        let now = Utc::now();
        let result = self.conn.execute(
            "INSERT INTO products
                 (sku, name, description, category, price_cents, sale_price_cents,
                  stock_on_hand, stock_reserved, is_active, thumbnail, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 1, ?8, ?9, ?9)",
            params![
                new.sku,
                new.name,
                new.description,
                new.category.as_str(),
                new.price.cents(),
                new.sale_price.map(Money::cents),
                new.stock_on_hand,
                new.thumbnail,
                now,
            ],
        );
        if let Err(err) = result {
            if is_sku_conflict(&err) {
                return Err(StoreError::DuplicateSku(new.sku.clone()));
            }
            return Err(err.into());
        }
        let id = ProductId::new(self.conn.last_insert_rowid());
        info!(product_id = %id, sku = %new.sku, "product created");
        product_by_id(&self.conn, id)
    }

    /// Fetch a product by id.
    pub fn product(&self, id: ProductId) -> Result<Product, StoreError> {
        product_by_id(&self.conn, id)
    }

    /// Fetch a product by SKU.
    pub fn product_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![sku], product_from_row)
            .optional()?)
    }

    /// List products, optionally restricted to a category, optionally to
    /// active ones only. Ordered by name.
    pub fn list_products(
        &self,
        category: Option<ProductCategory>,
        only_active: bool,
    ) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE (?1 IS NULL OR category = ?1)
               AND (?2 = 0 OR is_active = 1)
             ORDER BY name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![category.map(|c| c.as_str()), only_active],
            product_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Apply a partial update. Immutable fields (SKU, stock counters) are
    /// not part of the patch type.
    pub fn update_product(
        &mut self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, StoreError> {
        if patch.is_empty() {
            return self.product(id);
        }
        let patch = patch.clone();
        self.with_immediate_tx(move |tx, _config| {
            let mut product = tx
                .query_row(
                    &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
                    params![id.get()],
                    product_from_row,
                )
                .optional()?
                .ok_or(StoreError::ProductNotFound(id))?;

            if let Some(name) = &patch.name {
                product.name = name.clone();
            }
            if let Some(description) = &patch.description {
                product.description = Some(description.clone());
            }
            if let Some(category) = patch.category {
                product.category = category;
            }
            if let Some(price) = patch.price {
                product.price = price;
            }
            if let Some(sale_price) = patch.sale_price {
                product.sale_price = sale_price;
            }
            if let Some(is_active) = patch.is_active {
                product.is_active = is_active;
            }
            if let Some(thumbnail) = &patch.thumbnail {
                product.thumbnail = Some(thumbnail.clone());
            }
            product.updated_at = Utc::now();

            tx.execute(
                "UPDATE products
                 SET name = ?2, description = ?3, category = ?4, price_cents = ?5,
                     sale_price_cents = ?6, is_active = ?7, thumbnail = ?8, updated_at = ?9
                 WHERE id = ?1",
                params![
                    id.get(),
                    product.name,
                    product.description,
                    product.category.as_str(),
                    product.price.cents(),
                    product.sale_price.map(Money::cents),
                    product.is_active,
                    product.thumbnail,
                    product.updated_at,
                ],
            )?;
            Ok(product)
        })
    }

    /// Add units to a product's on-hand stock and record the movement.
    pub fn restock(
        &mut self,
        id: ProductId,
        quantity: i64,
        reference: Option<&str>,
    ) -> Result<Product, StoreError> {
        if quantity <= 0 {
            return Err(storefront_commerce::CommerceError::InvalidQuantity(quantity).into());
        }
        let reference = reference.map(str::to_owned);
        let product = self.with_immediate_tx(move |tx, _config| {
            let now = Utc::now();
            let changed = tx.execute(
                "UPDATE products
                 SET stock_on_hand = stock_on_hand + ?2, updated_at = ?3
                 WHERE id = ?1",
                params![id.get(), quantity, now],
            )?;
            if changed == 0 {
                return Err(StoreError::ProductNotFound(id));
            }
            record_movement(tx, id, MovementKind::Restock, quantity, reference.as_deref(), now)?;
            tx.query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
                params![id.get()],
                product_from_row,
            )
            .map_err(StoreError::from)
        })?;
        info!(product_id = %id, quantity, on_hand = product.stock.on_hand, "product restocked");
        Ok(product)
    }

    /// Sellable quantity (on hand minus reserved) for one product.
    pub fn available_stock(&self, id: ProductId) -> Result<i64, StoreError> {
        self.conn
            .query_row(
                "SELECT stock_on_hand - stock_reserved FROM products WHERE id = ?1",
                params![id.get()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::ProductNotFound(id))
    }

    /// Audit trail for a product, newest first.
    pub fn stock_movements(&self, id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, kind, quantity, reference, created_at
             FROM stock_movements WHERE product_id = ?1
             ORDER BY id DESC",
        )?;
        let rows = stmt.query_map(params![id.get()], |row| {
            let kind_raw: String = row.get(1)?;
            let kind = MovementKind::parse(&kind_raw)
                .ok_or_else(|| bad_column(1, format!("unknown movement kind {kind_raw:?}")))?;
            Ok(StockMovement {
                product_id: ProductId::new(row.get(0)?),
                kind,
                quantity: row.get(2)?,
                reference: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
