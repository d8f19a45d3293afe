//! Orders and the order lifecycle.
//!
//! An order is an immutable snapshot of what the customer bought (names,
//! SKUs, unit prices) plus a status machine. Catalog edits after placement
//! never change an existing order.

use crate::checkout::{Address, OrderTotals};
use crate::error::CommerceError;
use crate::ids::{CouponId, OrderId, OrderItemId, ProductId, UserId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
    PartiallyRefunded,
    Returned,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::PartiallyRefunded => "partially_refunded",
            OrderStatus::Returned => "returned",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            "refunded" => Some(OrderStatus::Refunded),
            "partially_refunded" => Some(OrderStatus::PartiallyRefunded),
            "returned" => Some(OrderStatus::Returned),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    /// Position in the fulfillment chain, when the status is on it.
    fn fulfillment_rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::OutForDelivery => Some(4),
            OrderStatus::Delivered => Some(5),
            _ => None,
        }
    }

    /// Check if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled
                | OrderStatus::Refunded
                | OrderStatus::Returned
                | OrderStatus::Failed
        )
    }

    /// Check if stock has been committed, i.e. the order reached `Shipped`.
    pub fn is_post_shipment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Shipped | OrderStatus::OutForDelivery | OrderStatus::Delivered
        )
    }

    /// Check if the transition `self -> to` is legal.
    ///
    /// The fulfillment chain moves strictly forward (skipping stages is
    /// allowed). Pre-shipment orders can fail or be cancelled; shipped or
    /// delivered orders can be returned or refunded.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        if *self == to {
            return false;
        }
        if let (Some(from_rank), Some(to_rank)) = (self.fulfillment_rank(), to.fulfillment_rank()) {
            return to_rank > from_rank;
        }
        match (self, to) {
            (OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing, dest) => {
                matches!(dest, OrderStatus::Cancelled | OrderStatus::Failed)
            }
            (from, dest) if from.is_post_shipment() => matches!(
                dest,
                OrderStatus::Returned | OrderStatus::Refunded | OrderStatus::PartiallyRefunded
            ),
            (OrderStatus::PartiallyRefunded, OrderStatus::Refunded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
    CashOnDelivery,
    ApplePay,
    GooglePay,
    Crypto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::ApplePay => "apple_pay",
            PaymentMethod::GooglePay => "google_pay",
            PaymentMethod::Crypto => "crypto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit_card" => Some(PaymentMethod::CreditCard),
            "debit_card" => Some(PaymentMethod::DebitCard),
            "paypal" => Some(PaymentMethod::Paypal),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "cash_on_delivery" => Some(PaymentMethod::CashOnDelivery),
            "apple_pay" => Some(PaymentMethod::ApplePay),
            "google_pay" => Some(PaymentMethod::GooglePay),
            "crypto" => Some(PaymentMethod::Crypto),
            _ => None,
        }
    }
}

/// Payment state, tracked separately from the order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
    Declined,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            "refunded" => Some(PaymentStatus::Refunded),
            "partially_refunded" => Some(PaymentStatus::PartiallyRefunded),
            "declined" => Some(PaymentStatus::Declined),
            _ => None,
        }
    }
}

/// How the order ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    Standard,
    Express,
    Overnight,
    SameDay,
    Pickup,
}

impl ShippingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "standard",
            ShippingMethod::Express => "express",
            ShippingMethod::Overnight => "overnight",
            ShippingMethod::SameDay => "same_day",
            ShippingMethod::Pickup => "pickup",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(ShippingMethod::Standard),
            "express" => Some(ShippingMethod::Express),
            "overnight" => Some(ShippingMethod::Overnight),
            "same_day" => Some(ShippingMethod::SameDay),
            "pickup" => Some(ShippingMethod::Pickup),
            _ => None,
        }
    }
}

/// A line item on an order.
///
/// Name, SKU and unit price are copied from the product at placement time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub line_total: Money,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing order number, e.g. `ORD-20260825-3FA4B2C1`.
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub shipping_method: ShippingMethod,
    pub shipping_address: Address,
    /// Billing address; the shipping address doubles as billing when absent.
    pub billing_address: Option<Address>,
    /// Pricing breakdown frozen at placement.
    pub totals: OrderTotals,
    /// Coupon code applied, if any.
    pub coupon_code: Option<String>,
    /// Coupon row redeemed, if any.
    pub coupon_id: Option<CouponId>,
    pub customer_notes: Option<String>,
    pub tracking_number: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Check if the owner may still cancel.
    pub fn can_cancel(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Check if an administrator may cancel. Anything that has not reached
    /// shipment or a terminal state qualifies.
    pub fn can_force_cancel(&self) -> bool {
        !self.status.is_terminal() && !self.status.is_post_shipment()
    }

    /// Check if the order qualifies for a refund: it reached the customer
    /// (or the carrier) and the payment actually settled.
    pub fn refund_eligible(&self) -> bool {
        matches!(self.status, OrderStatus::Shipped | OrderStatus::Delivered)
            && self.payment_status == PaymentStatus::Completed
    }

    /// Move to a new status, stamping the matching timestamp.
    pub fn transition(&mut self, to: OrderStatus, now: DateTime<Utc>) -> Result<(), CommerceError> {
        if !self.status.can_transition_to(to) {
            return Err(CommerceError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        match to {
            OrderStatus::Confirmed => self.confirmed_at = Some(now),
            OrderStatus::Processing => self.processed_at = Some(now),
            OrderStatus::Shipped => self.shipped_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => self.cancelled_at = Some(now),
            _ => {}
        }
        Ok(())
    }
}

/// Generate a unique order number: `ORD-` + date + 8 random hex digits.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        let address = Address {
            street: "123 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
            phone: None,
        };
        Order {
            id: OrderId::new(1),
            order_number: generate_order_number(now),
            user_id: UserId::new(1),
            status,
            payment_method: PaymentMethod::CreditCard,
            payment_status: PaymentStatus::Pending,
            shipping_method: ShippingMethod::Standard,
            shipping_address: address,
            billing_address: None,
            totals: OrderTotals {
                subtotal: Money::new(10000),
                discount_total: Money::ZERO,
                shipping_total: Money::ZERO,
                tax_total: Money::new(1000),
                grand_total: Money::new(11000),
            },
            coupon_code: None,
            coupon_id: None,
            customer_notes: None,
            tracking_number: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            processed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_fulfillment_moves_forward_only() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_pre_shipment_can_fail_or_cancel() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
        ] {
            assert!(s.can_transition_to(OrderStatus::Cancelled));
            assert!(s.can_transition_to(OrderStatus::Failed));
        }
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_post_shipment_refund_paths() {
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Returned));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::PartiallyRefunded));
        assert!(OrderStatus::PartiallyRefunded.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn test_transition_stamps_timestamps() {
        let mut o = order(OrderStatus::Pending);
        let now = Utc::now();
        o.transition(OrderStatus::Confirmed, now).unwrap();
        assert_eq!(o.confirmed_at, Some(now));
        o.transition(OrderStatus::Shipped, now).unwrap();
        assert_eq!(o.shipped_at, Some(now));
        assert!(o.processed_at.is_none());
    }

    #[test]
    fn test_illegal_transition_is_error() {
        let mut o = order(OrderStatus::Cancelled);
        let err = o.transition(OrderStatus::Confirmed, Utc::now());
        assert_eq!(
            err,
            Err(CommerceError::InvalidStatusTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Confirmed,
            })
        );
    }

    #[test]
    fn test_cancel_windows() {
        assert!(order(OrderStatus::Pending).can_cancel());
        assert!(order(OrderStatus::Confirmed).can_cancel());
        assert!(!order(OrderStatus::Processing).can_cancel());
        assert!(order(OrderStatus::Processing).can_force_cancel());
        assert!(!order(OrderStatus::Shipped).can_force_cancel());
    }

    #[test]
    fn test_refund_eligibility_needs_settled_payment() {
        let mut o = order(OrderStatus::Delivered);
        assert!(!o.refund_eligible());
        o.payment_status = PaymentStatus::Completed;
        assert!(o.refund_eligible());
        o.status = OrderStatus::Processing;
        assert!(!o.refund_eligible());
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc::now();
        let n = generate_order_number(now);
        let parts: Vec<&str> = n.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], now.format("%Y%m%d").to_string());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(n, generate_order_number(now));
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
            OrderStatus::PartiallyRefunded,
            OrderStatus::Returned,
            OrderStatus::Failed,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("SHIPPED"), None);
    }
}
