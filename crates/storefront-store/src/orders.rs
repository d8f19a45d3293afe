//! Order placement and lifecycle service.
//!
//! Placement is one immediate transaction: cart read, product snapshots,
//! coupon redemption, totals, order insert, stock reservation, cart clear.
//! Either all of it lands or none of it does. Stock and coupon updates use
//! guarded UPDATEs so the checks hold even against concurrent writers.

use crate::carts::cart_items_for_user;
use crate::coupons::{coupon_by_code, increment_usage, user_prior_uses};
use crate::error::StoreError;
use crate::products::{bad_column, product_from_row, record_movement};
use crate::store::Store;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use storefront_commerce::cart;
use storefront_commerce::catalog::MovementKind;
use storefront_commerce::checkout::{
    generate_order_number, Address, Order, OrderItem, OrderStatus, OrderTotals, PaymentMethod,
    PaymentStatus, ShippingMethod,
};
use storefront_commerce::coupon::{Coupon, RedemptionContext};
use storefront_commerce::{
    CommerceError, CouponId, Money, OrderId, OrderItemId, ProductId, UserId,
};
use tracing::{info, warn};

/// Everything the customer supplies at checkout. Line items come from the
/// cart, prices from the catalog.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub coupon_code: Option<String>,
    pub customer_notes: Option<String>,
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_method, payment_status, \
     shipping_method, shipping_address, billing_address, subtotal_cents, discount_cents, \
     shipping_cents, tax_cents, total_cents, coupon_code, coupon_id, customer_notes, \
     tracking_number, created_at, updated_at, confirmed_at, processed_at, shipped_at, \
     delivered_at, cancelled_at";

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let status_raw: String = row.get(3)?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| bad_column(3, format!("unknown order status {status_raw:?}")))?;
    let payment_method_raw: String = row.get(4)?;
    let payment_method = PaymentMethod::parse(&payment_method_raw)
        .ok_or_else(|| bad_column(4, format!("unknown payment method {payment_method_raw:?}")))?;
    let payment_status_raw: String = row.get(5)?;
    let payment_status = PaymentStatus::parse(&payment_status_raw)
        .ok_or_else(|| bad_column(5, format!("unknown payment status {payment_status_raw:?}")))?;
    let shipping_method_raw: String = row.get(6)?;
    let shipping_method = ShippingMethod::parse(&shipping_method_raw).ok_or_else(|| {
        bad_column(6, format!("unknown shipping method {shipping_method_raw:?}"))
    })?;

    let shipping_address_raw: String = row.get(7)?;
    let shipping_address: Address = serde_json::from_str(&shipping_address_raw)
        .map_err(|e| bad_column(7, format!("bad shipping address: {e}")))?;
    let billing_address = match row.get::<_, Option<String>>(8)? {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| bad_column(8, format!("bad billing address: {e}")))?,
        ),
        None => None,
    };

    Ok(Order {
        id: OrderId::new(row.get(0)?),
        order_number: row.get(1)?,
        user_id: UserId::new(row.get(2)?),
        status,
        payment_method,
        payment_status,
        shipping_method,
        shipping_address,
        billing_address,
        totals: OrderTotals {
            subtotal: Money::new(row.get(9)?),
            discount_total: Money::new(row.get(10)?),
            shipping_total: Money::new(row.get(11)?),
            tax_total: Money::new(row.get(12)?),
            grand_total: Money::new(row.get(13)?),
        },
        coupon_code: row.get(14)?,
        coupon_id: row.get::<_, Option<i64>>(15)?.map(CouponId::new),
        customer_notes: row.get(16)?,
        tracking_number: row.get(17)?,
        items: Vec::new(),
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
        confirmed_at: row.get(20)?,
        processed_at: row.get(21)?,
        shipped_at: row.get(22)?,
        delivered_at: row.get(23)?,
        cancelled_at: row.get(24)?,
    })
}

fn order_items(conn: &Connection, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, product_id, product_name, sku, unit_price_cents, quantity,
                line_total_cents
         FROM order_items WHERE order_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![order_id.get()], |row| {
        Ok(OrderItem {
            id: OrderItemId::new(row.get(0)?),
            order_id: OrderId::new(row.get(1)?),
            product_id: ProductId::new(row.get(2)?),
            product_name: row.get(3)?,
            sku: row.get(4)?,
            unit_price: Money::new(row.get(5)?),
            quantity: row.get(6)?,
            line_total: Money::new(row.get(7)?),
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn load_order(conn: &Connection, id: OrderId) -> Result<Order, StoreError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    let mut order = conn
        .query_row(&sql, params![id.get()], order_from_row)
        .optional()?
        .ok_or(StoreError::OrderNotFound(id))?;
    order.items = order_items(conn, id)?;
    Ok(order)
}

/// Write the lifecycle columns back after a transition.
fn persist_lifecycle(tx: &Transaction<'_>, order: &Order) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE orders
         SET status = ?2, payment_status = ?3, tracking_number = ?4, updated_at = ?5,
             confirmed_at = ?6, processed_at = ?7, shipped_at = ?8, delivered_at = ?9,
             cancelled_at = ?10
         WHERE id = ?1",
        params![
            order.id.get(),
            order.status.as_str(),
            order.payment_status.as_str(),
            order.tracking_number,
            order.updated_at,
            order.confirmed_at,
            order.processed_at,
            order.shipped_at,
            order.delivered_at,
            order.cancelled_at,
        ],
    )?;
    Ok(())
}

/// Reserve stock for one line with a guard on availability.
fn reserve_stock(
    tx: &Transaction<'_>,
    product_id: ProductId,
    quantity: i64,
) -> Result<bool, StoreError> {
    let changed = tx.execute(
        "UPDATE products
         SET stock_reserved = stock_reserved + ?2, updated_at = ?3
         WHERE id = ?1 AND stock_on_hand - stock_reserved >= ?2",
        params![product_id.get(), quantity, Utc::now()],
    )?;
    Ok(changed > 0)
}

/// Release a reservation (cancellation).
fn release_stock(
    tx: &Transaction<'_>,
    product_id: ProductId,
    quantity: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE products
         SET stock_reserved = MAX(stock_reserved - ?2, 0), updated_at = ?3
         WHERE id = ?1",
        params![product_id.get(), quantity, Utc::now()],
    )?;
    Ok(())
}

/// Turn a reservation into a sale (shipment): both counters drop together.
fn commit_stock(
    tx: &Transaction<'_>,
    product_id: ProductId,
    quantity: i64,
) -> Result<bool, StoreError> {
    let changed = tx.execute(
        "UPDATE products
         SET stock_on_hand = stock_on_hand - ?2, stock_reserved = stock_reserved - ?2,
             updated_at = ?3
         WHERE id = ?1 AND stock_reserved >= ?2 AND stock_on_hand >= ?2",
        params![product_id.get(), quantity, Utc::now()],
    )?;
    Ok(changed > 0)
}

/// Validate the coupon leniently and claim a use. An invalid or exhausted
/// coupon does not fail the order; the discount is simply dropped.
fn apply_coupon(
    tx: &Transaction<'_>,
    code: &str,
    user_id: UserId,
    ctx: &RedemptionContext<'_>,
) -> Result<Option<Coupon>, StoreError> {
    let coupon = match coupon_by_code(tx, code)? {
        Some(c) => c,
        None => {
            warn!(code, "coupon code not found, placing order without discount");
            return Ok(None);
        }
    };
    let mut ctx = ctx.clone();
    ctx.user_prior_uses = Some(user_prior_uses(tx, coupon.id, user_id)?);
    if let Err(rejection) = coupon.validate(&ctx, Utc::now()) {
        warn!(code, %rejection, "coupon rejected, placing order without discount");
        return Ok(None);
    }
    if !increment_usage(tx, coupon.id)? {
        warn!(code, "coupon usage cap reached, placing order without discount");
        return Ok(None);
    }
    Ok(Some(coupon))
}

impl Store {
    /// Place an order from the user's cart.
    ///
    /// Runs entirely inside one write transaction. On any error the
    /// database is untouched: no order row, no reservation, no coupon use,
    /// and the cart is preserved.
    pub fn place_order(
        &mut self,
        user_id: UserId,
        request: &PlaceOrderRequest,
    ) -> Result<Order, StoreError> {
        request.shipping_address.validate().map_err(StoreError::from)?;
        if let Some(billing) = &request.billing_address {
            billing.validate()?;
        }

        let order = self.with_immediate_tx(move |tx, config| {
            let cart_items = cart_items_for_user(tx, user_id)?;
            if cart_items.is_empty() {
                return Err(CommerceError::EmptyCart.into());
            }

            // Snapshot each line from the live catalog.
            let mut lines = Vec::with_capacity(cart_items.len());
            let mut subtotal = Money::ZERO;
            for item in &cart_items {
                let product = tx
                    .query_row(
                        "SELECT id, sku, name, description, category, price_cents,
                                sale_price_cents, stock_on_hand, stock_reserved, is_active,
                                thumbnail, created_at, updated_at
                         FROM products WHERE id = ?1",
                        params![item.product_id.get()],
                        product_from_row,
                    )
                    .optional()?
                    .ok_or(CommerceError::ProductUnavailable(item.product_id))?;
                if !product.is_active {
                    return Err(CommerceError::ProductUnavailable(product.id).into());
                }
                if !product.stock.can_fulfill(item.quantity) {
                    return Err(CommerceError::InsufficientStock {
                        product_id: product.id,
                        requested: item.quantity,
                        available: product.available(),
                    }
                    .into());
                }
                let unit_price = product.current_price();
                let line_total = unit_price
                    .checked_mul(item.quantity)
                    .ok_or(CommerceError::Overflow)?;
                subtotal = subtotal
                    .checked_add(line_total)
                    .ok_or(CommerceError::Overflow)?;
                lines.push((product, item.quantity, unit_price, line_total));
            }

            let product_ids: Vec<ProductId> = lines.iter().map(|(p, ..)| p.id).collect();
            let ctx = RedemptionContext {
                order_amount: subtotal,
                item_count: cart::total_quantity(&cart_items),
                product_ids: &product_ids,
                user_prior_uses: None,
            };
            let coupon = match &request.coupon_code {
                Some(code) => apply_coupon(tx, code, user_id, &ctx)?,
                None => None,
            };
            let discount = coupon
                .as_ref()
                .map(|c| c.discount_amount(subtotal, config))
                .unwrap_or(Money::ZERO);

            let totals =
                OrderTotals::compute(subtotal, discount, request.shipping_method, config)?;

            let now = Utc::now();
            let order_number = generate_order_number(now);
            tx.execute(
                "INSERT INTO orders
                     (order_number, user_id, status, payment_method, payment_status,
                      shipping_method, shipping_address, billing_address, subtotal_cents,
                      discount_cents, shipping_cents, tax_cents, total_cents, coupon_code,
                      coupon_id, customer_notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
                params![
                    order_number,
                    user_id.get(),
                    OrderStatus::Pending.as_str(),
                    request.payment_method.as_str(),
                    PaymentStatus::Pending.as_str(),
                    request.shipping_method.as_str(),
                    serde_json::to_string(&request.shipping_address)?,
                    request
                        .billing_address
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    totals.subtotal.cents(),
                    totals.discount_total.cents(),
                    totals.shipping_total.cents(),
                    totals.tax_total.cents(),
                    totals.grand_total.cents(),
                    coupon.as_ref().map(|c| c.code.as_str()),
                    coupon.as_ref().map(|c| c.id.get()),
                    request.customer_notes,
                    now,
                ],
            )?;
            let order_id = OrderId::new(tx.last_insert_rowid());

            for (product, quantity, unit_price, line_total) in &lines {
                tx.execute(
                    "INSERT INTO order_items
                         (order_id, product_id, product_name, sku, unit_price_cents,
                          quantity, line_total_cents)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        order_id.get(),
                        product.id.get(),
                        product.name,
                        product.sku,
                        unit_price.cents(),
                        quantity,
                        line_total.cents(),
                    ],
                )?;

                if !reserve_stock(tx, product.id, *quantity)? {
                    // Guard lost a race this transaction cannot observe;
                    // report against the snapshot.
                    return Err(CommerceError::InsufficientStock {
                        product_id: product.id,
                        requested: *quantity,
                        available: product.available(),
                    }
                    .into());
                }
                record_movement(
                    tx,
                    product.id,
                    MovementKind::Reserved,
                    *quantity,
                    Some(&order_number),
                    now,
                )?;
            }

            if let Some(coupon) = &coupon {
                tx.execute(
                    "INSERT INTO coupon_usages (coupon_id, user_id, order_id, used_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![coupon.id.get(), user_id.get(), order_id.get(), now],
                )?;
            }

            tx.execute(
                "DELETE FROM cart_items WHERE user_id = ?1",
                params![user_id.get()],
            )?;

            load_order(tx, order_id)
        })?;

        info!(
            order = %order.order_number,
            user_id = %user_id,
            total = %order.totals.grand_total,
            "order placed"
        );
        Ok(order)
    }

    /// Cancel an order and release its reservations.
    ///
    /// Owners may cancel while the order is pending or confirmed;
    /// administrators may cancel anything not yet shipped. Orders belonging
    /// to other users are reported as not found.
    pub fn cancel_order(
        &mut self,
        order_id: OrderId,
        acting_user: UserId,
        is_admin: bool,
    ) -> Result<Order, StoreError> {
        let order = self.with_immediate_tx(move |tx, _config| {
            let mut order = load_order(tx, order_id)?;
            if !is_admin && order.user_id != acting_user {
                return Err(StoreError::OrderNotFound(order_id));
            }
            let allowed = if is_admin {
                order.can_force_cancel()
            } else {
                order.can_cancel()
            };
            if !allowed {
                return Err(CommerceError::InvalidStatusTransition {
                    from: order.status,
                    to: OrderStatus::Cancelled,
                }
                .into());
            }

            let now = Utc::now();
            order.transition(OrderStatus::Cancelled, now)?;
            if matches!(
                order.payment_status,
                PaymentStatus::Pending | PaymentStatus::Processing
            ) {
                order.payment_status = PaymentStatus::Cancelled;
            }

            for item in &order.items {
                release_stock(tx, item.product_id, item.quantity)?;
                record_movement(
                    tx,
                    item.product_id,
                    MovementKind::Released,
                    item.quantity,
                    Some(&order.order_number),
                    now,
                )?;
            }
            persist_lifecycle(tx, &order)?;
            Ok(order)
        })?;

        info!(order = %order.order_number, admin = is_admin, "order cancelled");
        Ok(order)
    }

    /// Move an order along its lifecycle (administrative).
    ///
    /// Shipping commits the reserved stock; a return puts the shipped units
    /// back on hand; a failed order releases its reservation. Cancellation
    /// goes through [`Store::cancel_order`] so reservations are released.
    pub fn update_order_status(
        &mut self,
        order_id: OrderId,
        to: OrderStatus,
    ) -> Result<Order, StoreError> {
        if to == OrderStatus::Cancelled {
            return self.cancel_order(order_id, UserId::new(0), true);
        }
        let order = self.with_immediate_tx(move |tx, _config| {
            let mut order = load_order(tx, order_id)?;
            let now = Utc::now();
            order.transition(to, now)?;

            match to {
                OrderStatus::Shipped => {
                    for item in &order.items {
                        if !commit_stock(tx, item.product_id, item.quantity)? {
                            return Err(StoreError::Decode(format!(
                                "reservation missing for product {} on order {}",
                                item.product_id, order.order_number
                            )));
                        }
                        record_movement(
                            tx,
                            item.product_id,
                            MovementKind::Sale,
                            item.quantity,
                            Some(&order.order_number),
                            now,
                        )?;
                    }
                }
                OrderStatus::Returned => {
                    for item in &order.items {
                        tx.execute(
                            "UPDATE products
                             SET stock_on_hand = stock_on_hand + ?2, updated_at = ?3
                             WHERE id = ?1",
                            params![item.product_id.get(), item.quantity, now],
                        )?;
                        record_movement(
                            tx,
                            item.product_id,
                            MovementKind::Return,
                            item.quantity,
                            Some(&order.order_number),
                            now,
                        )?;
                    }
                }
                // Failed is terminal and only reachable pre-shipment, so
                // the placement reservation must be handed back here.
                OrderStatus::Failed => {
                    for item in &order.items {
                        release_stock(tx, item.product_id, item.quantity)?;
                        record_movement(
                            tx,
                            item.product_id,
                            MovementKind::Released,
                            item.quantity,
                            Some(&order.order_number),
                            now,
                        )?;
                    }
                }
                OrderStatus::Refunded => order.payment_status = PaymentStatus::Refunded,
                OrderStatus::PartiallyRefunded => {
                    order.payment_status = PaymentStatus::PartiallyRefunded
                }
                _ => {}
            }
            persist_lifecycle(tx, &order)?;
            Ok(order)
        })?;

        info!(order = %order.order_number, status = %to, "order status updated");
        Ok(order)
    }

    /// Refund a settled, shipped-or-delivered order.
    pub fn refund_order(&mut self, order_id: OrderId) -> Result<Order, StoreError> {
        let order = self.order(order_id)?;
        if !order.refund_eligible() {
            return Err(StoreError::NotRefundEligible {
                order: order_id,
                status: order.status,
            });
        }
        self.update_order_status(order_id, OrderStatus::Refunded)
    }

    /// Record the payment processor's verdict.
    pub fn set_payment_status(
        &mut self,
        order_id: OrderId,
        status: PaymentStatus,
    ) -> Result<Order, StoreError> {
        self.with_immediate_tx(move |tx, _config| {
            let mut order = load_order(tx, order_id)?;
            order.payment_status = status;
            order.updated_at = Utc::now();
            persist_lifecycle(tx, &order)?;
            Ok(order)
        })
    }

    /// Attach a carrier tracking number.
    pub fn set_tracking_number(
        &mut self,
        order_id: OrderId,
        tracking: &str,
    ) -> Result<Order, StoreError> {
        let tracking = tracking.to_owned();
        self.with_immediate_tx(move |tx, _config| {
            let mut order = load_order(tx, order_id)?;
            order.tracking_number = Some(tracking.clone());
            order.updated_at = Utc::now();
            persist_lifecycle(tx, &order)?;
            Ok(order)
        })
    }

    /// Fetch an order with its items.
    pub fn order(&self, id: OrderId) -> Result<Order, StoreError> {
        load_order(&self.conn, id)
    }

    /// Fetch an order by its human-facing number.
    pub fn order_by_number(&self, number: &str) -> Result<Option<Order>, StoreError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1");
        let order = self
            .conn
            .query_row(&sql, params![number], order_from_row)
            .optional()?;
        match order {
            Some(mut order) => {
                order.items = order_items(&self.conn, order.id)?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    /// All of a user's orders, newest first, items included.
    pub fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id.get()], order_from_row)?;
        let mut orders = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        for order in &mut orders {
            order.items = order_items(&self.conn, order.id)?;
        }
        Ok(orders)
    }
}
