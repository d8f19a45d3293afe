//! Coupon persistence and standalone validation.

use crate::error::StoreError;
use crate::products::bad_column;
use crate::store::Store;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use storefront_commerce::coupon::{
    Coupon, CouponValidation, DiscountKind, NewCoupon, RedemptionContext,
};
use storefront_commerce::{CouponId, Money, ProductId, UserId};
use tracing::info;

const COUPON_COLUMNS: &str = "id, code, name, discount_type, discount_percent, discount_cents, \
     minimum_order_cents, maximum_discount_cents, max_uses, current_uses, max_uses_per_user, \
     minimum_items, maximum_items, valid_from, valid_until, is_active, \
     applicable_products, excluded_products, created_at, updated_at";

fn product_list_from_json(idx: usize, raw: Option<String>) -> rusqlite::Result<Vec<ProductId>> {
    match raw {
        Some(json) => {
            let ids: Vec<i64> = serde_json::from_str(&json)
                .map_err(|e| bad_column(idx, format!("bad product list: {e}")))?;
            Ok(ids.into_iter().map(ProductId::new).collect())
        }
        None => Ok(Vec::new()),
    }
}

fn product_list_to_json(ids: &[ProductId]) -> Result<Option<String>, serde_json::Error> {
    if ids.is_empty() {
        return Ok(None);
    }
    let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
    Ok(Some(serde_json::to_string(&raw)?))
}

fn coupon_from_row(row: &Row<'_>) -> rusqlite::Result<Coupon> {
    let discount_type: String = row.get(3)?;
    let kind = match discount_type.as_str() {
        "percentage" => DiscountKind::Percentage(row.get(4)?),
        "fixed" => DiscountKind::Fixed(Money::new(row.get(5)?)),
        "free_shipping" => DiscountKind::FreeShipping,
        other => {
            return Err(bad_column(3, format!("unknown discount type {other:?}")));
        }
    };
    Ok(Coupon {
        id: CouponId::new(row.get(0)?),
        code: row.get(1)?,
        name: row.get(2)?,
        kind,
        minimum_order_amount: Money::new(row.get(6)?),
        maximum_discount: row.get::<_, Option<i64>>(7)?.map(Money::new),
        max_uses: row.get(8)?,
        current_uses: row.get(9)?,
        max_uses_per_user: row.get(10)?,
        minimum_items: row.get(11)?,
        maximum_items: row.get(12)?,
        valid_from: row.get(13)?,
        valid_until: row.get(14)?,
        is_active: row.get(15)?,
        applicable_products: product_list_from_json(16, row.get(16)?)?,
        excluded_products: product_list_from_json(17, row.get(17)?)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

/// Fetch a coupon by code. Shared with order placement.
pub(crate) fn coupon_by_code(
    conn: &Connection,
    code: &str,
) -> Result<Option<Coupon>, StoreError> {
    let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?1");
    Ok(conn.query_row(&sql, params![code], coupon_from_row).optional()?)
}

/// How many times a user has redeemed a coupon.
pub(crate) fn user_prior_uses(
    conn: &Connection,
    coupon_id: CouponId,
    user_id: UserId,
) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = ?1 AND user_id = ?2",
        params![coupon_id.get(), user_id.get()],
        |row| row.get(0),
    )?)
}

/// Claim one use of the coupon. The guard re-checks the global cap inside
/// the write, so concurrent redemptions cannot exceed `max_uses`. Returns
/// false when the cap is exhausted.
pub(crate) fn increment_usage(tx: &Transaction<'_>, id: CouponId) -> Result<bool, StoreError> {
    let changed = tx.execute(
        "UPDATE coupons
         SET current_uses = current_uses + 1, updated_at = ?2
         WHERE id = ?1 AND (max_uses IS NULL OR current_uses < max_uses)",
        params![id.get(), Utc::now()],
    )?;
    Ok(changed > 0)
}

fn is_code_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("coupons.code")
    )
}

impl Store {
    /// Create a coupon. The code must be unique.
    pub fn create_coupon(&mut self, new: &NewCoupon) -> Result<Coupon, StoreError> {
        let now = Utc::now();
        let (discount_percent, discount_cents) = match new.kind {
            DiscountKind::Percentage(p) => (Some(p), None),
            DiscountKind::Fixed(m) => (None, Some(m.cents())),
            DiscountKind::FreeShipping => (None, None),
        };
        let result = self.conn.execute(
            "INSERT INTO coupons
                 (code, name, discount_type, discount_percent, discount_cents,
                  minimum_order_cents, maximum_discount_cents, max_uses, current_uses,
                  max_uses_per_user, minimum_items, maximum_items, valid_from, valid_until,
                  is_active, applicable_products, excluded_products, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?15, ?16, ?16)",
            params![
                new.code,
                new.name,
                new.kind.as_str(),
                discount_percent,
                discount_cents,
                new.minimum_order_amount.cents(),
                new.maximum_discount.map(Money::cents),
                new.max_uses,
                new.max_uses_per_user,
                new.minimum_items,
                new.maximum_items,
                new.valid_from,
                new.valid_until,
                product_list_to_json(&new.applicable_products)?,
                product_list_to_json(&new.excluded_products)?,
                now,
            ],
        );
        if let Err(err) = result {
            if is_code_conflict(&err) {
                return Err(StoreError::DuplicateCouponCode(new.code.clone()));
            }
            return Err(err.into());
        }
        let id = self.conn.last_insert_rowid();
        info!(coupon_id = id, code = %new.code, "coupon created");
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], coupon_from_row)?)
    }

    /// Fetch a coupon by code.
    pub fn coupon(&self, code: &str) -> Result<Coupon, StoreError> {
        coupon_by_code(&self.conn, code)?
            .ok_or_else(|| StoreError::CouponNotFound(code.to_string()))
    }

    /// Dry-run a coupon against a prospective order. Never mutates usage
    /// counters.
    pub fn validate_coupon(
        &self,
        code: &str,
        user_id: Option<UserId>,
        order_amount: Money,
        item_count: i64,
        product_ids: &[ProductId],
    ) -> Result<CouponValidation, StoreError> {
        let coupon = self.coupon(code)?;
        let prior_uses = match user_id {
            Some(user) => Some(user_prior_uses(&self.conn, coupon.id, user)?),
            None => None,
        };
        let ctx = RedemptionContext {
            order_amount,
            item_count,
            product_ids,
            user_prior_uses: prior_uses,
        };
        Ok(match coupon.validate(&ctx, Utc::now()) {
            Ok(()) => CouponValidation {
                valid: true,
                discount_amount: coupon.discount_amount(order_amount, &self.config),
                reason: None,
            },
            Err(rejection) => CouponValidation {
                valid: false,
                discount_amount: Money::ZERO,
                reason: Some(rejection.to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> Store {
        Store::open_in_memory(storefront_commerce::StoreConfig::default()).unwrap()
    }

    fn welcome10() -> NewCoupon {
        let now = Utc::now();
        NewCoupon::simple(
            "WELCOME10",
            "Welcome 10% Off",
            DiscountKind::Percentage(10.0),
            now - Duration::days(1),
            now + Duration::days(30),
        )
    }

    #[test]
    fn test_create_and_fetch() {
        let mut store = store();
        let created = store.create_coupon(&welcome10()).unwrap();
        assert_eq!(created.current_uses, 0);
        assert!(created.is_active);

        let fetched = store.coupon("WELCOME10").unwrap();
        assert_eq!(fetched, created);
        assert!(matches!(
            store.coupon("NOPE"),
            Err(StoreError::CouponNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let mut store = store();
        store.create_coupon(&welcome10()).unwrap();
        assert!(matches!(
            store.create_coupon(&welcome10()),
            Err(StoreError::DuplicateCouponCode(_))
        ));
    }

    #[test]
    fn test_fixed_coupon_round_trips() {
        let mut store = store();
        let mut new = welcome10();
        new.code = "TENOFF".to_string();
        new.kind = DiscountKind::Fixed(Money::new(1000));
        new.applicable_products = vec![ProductId::new(3), ProductId::new(7)];
        let coupon = store.create_coupon(&new).unwrap();
        assert_eq!(coupon.kind, DiscountKind::Fixed(Money::new(1000)));
        assert_eq!(
            coupon.applicable_products,
            vec![ProductId::new(3), ProductId::new(7)]
        );
    }

    #[test]
    fn test_validate_reports_discount() {
        let mut store = store();
        store.create_coupon(&welcome10()).unwrap();

        let v = store
            .validate_coupon("WELCOME10", None, Money::new(13000), 2, &[])
            .unwrap();
        assert!(v.valid);
        assert_eq!(v.discount_amount, Money::new(1300));
        assert_eq!(v.reason, None);
    }

    #[test]
    fn test_validate_reports_rejection() {
        let mut store = store();
        let mut new = welcome10();
        new.minimum_order_amount = Money::new(5000);
        store.create_coupon(&new).unwrap();

        let v = store
            .validate_coupon("WELCOME10", None, Money::new(1000), 1, &[])
            .unwrap();
        assert!(!v.valid);
        assert_eq!(v.discount_amount, Money::ZERO);
        assert!(v.reason.is_some());
    }

    #[test]
    fn test_increment_usage_guard() {
        let mut store = store();
        let mut new = welcome10();
        new.max_uses = Some(2);
        let coupon = store.create_coupon(&new).unwrap();

        let id = coupon.id;
        let claims = store
            .with_immediate_tx(move |tx, _| {
                let a = increment_usage(tx, id)?;
                let b = increment_usage(tx, id)?;
                let c = increment_usage(tx, id)?;
                Ok((a, b, c))
            })
            .unwrap();
        assert_eq!(claims, (true, true, false));
        assert_eq!(store.coupon("WELCOME10").unwrap().current_uses, 2);
    }
}
