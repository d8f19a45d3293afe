//! SQLite schema.
//!
//! Money columns hold integer cents, timestamps RFC 3339 text, enum
//! columns the canonical lowercase encodings. The products CHECK keeps the
//! reservation invariant enforced at the storage layer as well.

use rusqlite::Connection;

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS products (
    id              INTEGER PRIMARY KEY,
    sku             TEXT NOT NULL UNIQUE,
    name            TEXT NOT NULL,
    description     TEXT,
    category        TEXT NOT NULL,
    price_cents     INTEGER NOT NULL,
    sale_price_cents INTEGER,
    stock_on_hand   INTEGER NOT NULL DEFAULT 0,
    stock_reserved  INTEGER NOT NULL DEFAULT 0,
    is_active       INTEGER NOT NULL DEFAULT 1,
    thumbnail       TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    CHECK (stock_reserved >= 0 AND stock_reserved <= stock_on_hand)
);

CREATE TABLE IF NOT EXISTS cart_items (
    id               INTEGER PRIMARY KEY,
    user_id          INTEGER NOT NULL,
    product_id       INTEGER NOT NULL REFERENCES products(id),
    quantity         INTEGER NOT NULL,
    selected_options TEXT,
    added_at         TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    UNIQUE (user_id, product_id)
);

CREATE TABLE IF NOT EXISTS coupons (
    id                   INTEGER PRIMARY KEY,
    code                 TEXT NOT NULL UNIQUE,
    name                 TEXT NOT NULL,
    discount_type        TEXT NOT NULL,
    discount_percent     REAL,
    discount_cents       INTEGER,
    minimum_order_cents  INTEGER NOT NULL DEFAULT 0,
    maximum_discount_cents INTEGER,
    max_uses             INTEGER,
    current_uses         INTEGER NOT NULL DEFAULT 0,
    max_uses_per_user    INTEGER NOT NULL DEFAULT 1,
    minimum_items        INTEGER NOT NULL DEFAULT 1,
    maximum_items        INTEGER,
    valid_from           TEXT NOT NULL,
    valid_until          TEXT NOT NULL,
    is_active            INTEGER NOT NULL DEFAULT 1,
    applicable_products  TEXT,
    excluded_products    TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS orders (
    id                INTEGER PRIMARY KEY,
    order_number      TEXT NOT NULL UNIQUE,
    user_id           INTEGER NOT NULL,
    status            TEXT NOT NULL,
    payment_method    TEXT NOT NULL,
    payment_status    TEXT NOT NULL,
    shipping_method   TEXT NOT NULL,
    shipping_address  TEXT NOT NULL,
    billing_address   TEXT,
    subtotal_cents    INTEGER NOT NULL,
    discount_cents    INTEGER NOT NULL DEFAULT 0,
    shipping_cents    INTEGER NOT NULL DEFAULT 0,
    tax_cents         INTEGER NOT NULL DEFAULT 0,
    total_cents       INTEGER NOT NULL,
    coupon_code       TEXT,
    coupon_id         INTEGER REFERENCES coupons(id),
    customer_notes    TEXT,
    tracking_number   TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    confirmed_at      TEXT,
    processed_at      TEXT,
    shipped_at        TEXT,
    delivered_at      TEXT,
    cancelled_at      TEXT
);

CREATE TABLE IF NOT EXISTS order_items (
    id           INTEGER PRIMARY KEY,
    order_id     INTEGER NOT NULL REFERENCES orders(id),
    product_id   INTEGER NOT NULL REFERENCES products(id),
    product_name TEXT NOT NULL,
    sku          TEXT NOT NULL,
    unit_price_cents INTEGER NOT NULL,
    quantity     INTEGER NOT NULL,
    line_total_cents INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS coupon_usages (
    id         INTEGER PRIMARY KEY,
    coupon_id  INTEGER NOT NULL REFERENCES coupons(id),
    user_id    INTEGER NOT NULL,
    order_id   INTEGER NOT NULL REFERENCES orders(id),
    used_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stock_movements (
    id         INTEGER PRIMARY KEY,
    product_id INTEGER NOT NULL REFERENCES products(id),
    kind       TEXT NOT NULL,
    quantity   INTEGER NOT NULL,
    reference  TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cart_items_user ON cart_items(user_id);
CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);
CREATE INDEX IF NOT EXISTS idx_coupon_usages_coupon_user
    ON coupon_usages(coupon_id, user_id);
CREATE INDEX IF NOT EXISTS idx_stock_movements_product
    ON stock_movements(product_id);
";

/// Create all tables and indexes if they do not exist.
pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
