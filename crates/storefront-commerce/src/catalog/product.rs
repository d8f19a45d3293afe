//! Product types.

use crate::catalog::StockLevel;
use crate::ids::ProductId;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Product category.
///
/// Persisted and transferred as the canonical lowercase string; no case
/// variants exist at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Electronics,
    Clothing,
    Books,
    HomeGarden,
    Sports,
    Beauty,
    Toys,
    Health,
    Food,
    Automotive,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Electronics => "electronics",
            ProductCategory::Clothing => "clothing",
            ProductCategory::Books => "books",
            ProductCategory::HomeGarden => "home_garden",
            ProductCategory::Sports => "sports",
            ProductCategory::Beauty => "beauty",
            ProductCategory::Toys => "toys",
            ProductCategory::Health => "health",
            ProductCategory::Food => "food",
            ProductCategory::Automotive => "automotive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "electronics" => Some(ProductCategory::Electronics),
            "clothing" => Some(ProductCategory::Clothing),
            "books" => Some(ProductCategory::Books),
            "home_garden" => Some(ProductCategory::HomeGarden),
            "sports" => Some(ProductCategory::Sports),
            "beauty" => Some(ProductCategory::Beauty),
            "toys" => Some(ProductCategory::Toys),
            "health" => Some(ProductCategory::Health),
            "food" => Some(ProductCategory::Food),
            "automotive" => Some(ProductCategory::Automotive),
            _ => None,
        }
    }
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    /// Stock keeping unit (unique).
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Category.
    pub category: ProductCategory,
    /// List price.
    pub price: Money,
    /// Sale price, when the product is on sale.
    pub sale_price: Option<Money>,
    /// Stock level.
    pub stock: StockLevel,
    /// Whether the product is purchasable.
    pub is_active: bool,
    /// Thumbnail image URL.
    pub thumbnail: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price charged right now: sale price when present, list price
    /// otherwise.
    pub fn current_price(&self) -> Money {
        self.sale_price.unwrap_or(self.price)
    }

    /// Check if the product is on sale.
    pub fn is_on_sale(&self) -> bool {
        matches!(self.sale_price, Some(sale) if sale < self.price)
    }

    /// Sellable quantity.
    pub fn available(&self) -> i64 {
        self.stock.available()
    }
}

/// Fields required to create a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: ProductCategory,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub stock_on_hand: i64,
    pub thumbnail: Option<String>,
}

/// Mutable product fields for partial updates.
///
/// Only the fields listed here can change after creation; unknown keys in
/// a serialized patch are rejected rather than silently ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ProductCategory>,
    pub price: Option<Money>,
    /// `Some(None)` clears the sale price.
    pub sale_price: Option<Option<Money>>,
    pub is_active: Option<bool>,
    pub thumbnail: Option<String>,
}

impl ProductPatch {
    /// Check if the patch changes anything.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.sale_price.is_none()
            && self.is_active.is_none()
            && self.thumbnail.is_none()
    }
}
