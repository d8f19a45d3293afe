//! Stock level and movement types.
//!
//! A product's stock is a pair `(on_hand, reserved)` with the invariant
//! `0 <= reserved <= on_hand`. The sellable portion is
//! `available = on_hand - reserved`. Placement reserves, cancellation
//! releases, shipment commits.

use crate::ids::ProductId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stock level for a product.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StockLevel {
    /// Physical units on hand.
    pub on_hand: i64,
    /// Units allocated to placed but unshipped orders.
    pub reserved: i64,
}

impl StockLevel {
    /// Create a stock level with nothing reserved.
    pub fn new(on_hand: i64) -> Self {
        Self {
            on_hand,
            reserved: 0,
        }
    }

    /// Sellable quantity (on hand minus reserved).
    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }

    /// Check if a specific quantity can be reserved.
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.available() >= quantity
    }

    /// Check if anything is sellable.
    pub fn is_in_stock(&self) -> bool {
        self.available() > 0
    }

    /// Reserve units for a placed order. Returns false if the available
    /// quantity does not cover the request; the level is left unchanged.
    pub fn reserve(&mut self, quantity: i64) -> bool {
        if !self.can_fulfill(quantity) {
            return false;
        }
        self.reserved += quantity;
        true
    }

    /// Release reserved units (order cancelled).
    pub fn release(&mut self, quantity: i64) {
        self.reserved = (self.reserved - quantity).max(0);
    }

    /// Commit reserved units (order shipped): both on-hand and reserved
    /// drop together. Returns false if the reservation does not cover the
    /// quantity.
    pub fn commit(&mut self, quantity: i64) -> bool {
        if self.reserved < quantity || self.on_hand < quantity {
            return false;
        }
        self.reserved -= quantity;
        self.on_hand -= quantity;
        true
    }

    /// Add units (restock).
    pub fn restock(&mut self, quantity: i64) {
        self.on_hand += quantity;
    }
}

/// Reason for a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Reserved for a placed order.
    Reserved,
    /// Released from a cancelled order.
    Released,
    /// Shipped to a customer.
    Sale,
    /// Restocked from a supplier.
    Restock,
    /// Manual correction.
    Correction,
    /// Returned by a customer.
    Return,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Reserved => "reserved",
            MovementKind::Released => "released",
            MovementKind::Sale => "sale",
            MovementKind::Restock => "restock",
            MovementKind::Correction => "correction",
            MovementKind::Return => "return",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reserved" => Some(MovementKind::Reserved),
            "released" => Some(MovementKind::Released),
            "sale" => Some(MovementKind::Sale),
            "restock" => Some(MovementKind::Restock),
            "correction" => Some(MovementKind::Correction),
            "return" => Some(MovementKind::Return),
            _ => None,
        }
    }
}

/// A stock movement record (audit trail).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockMovement {
    /// Product that moved.
    pub product_id: ProductId,
    /// Reason for the movement.
    pub kind: MovementKind,
    /// Units moved.
    pub quantity: i64,
    /// Reference (e.g. an order number).
    pub reference: Option<String>,
    /// When the movement happened.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_reduces_available() {
        let mut stock = StockLevel::new(10);
        assert!(stock.can_fulfill(10));
        assert!(!stock.can_fulfill(11));

        assert!(stock.reserve(3));
        assert_eq!(stock.reserved, 3);
        assert_eq!(stock.on_hand, 10);
        assert_eq!(stock.available(), 7);
    }

    #[test]
    fn test_reserve_fails_without_stock() {
        let mut stock = StockLevel::new(5);
        assert!(stock.reserve(5));
        assert!(!stock.reserve(1));
        assert_eq!(stock.reserved, 5);
    }

    #[test]
    fn test_release_restores_available() {
        let mut stock = StockLevel::new(10);
        stock.reserve(4);
        stock.release(4);
        assert_eq!(stock.available(), 10);
        assert_eq!(stock.reserved, 0);
    }

    #[test]
    fn test_commit_drops_both() {
        let mut stock = StockLevel::new(10);
        stock.reserve(3);
        assert!(stock.commit(3));
        assert_eq!(stock.on_hand, 7);
        assert_eq!(stock.reserved, 0);
        assert_eq!(stock.available(), 7);
    }

    #[test]
    fn test_commit_requires_reservation() {
        let mut stock = StockLevel::new(10);
        assert!(!stock.commit(1));
        assert_eq!(stock.on_hand, 10);
    }

    #[test]
    fn test_invariant_holds_through_lifecycle() {
        let mut stock = StockLevel::new(6);
        stock.reserve(6);
        assert!(stock.reserved <= stock.on_hand);
        stock.commit(4);
        assert!(stock.reserved <= stock.on_hand);
        stock.release(2);
        assert!(stock.reserved >= 0);
        assert_eq!(stock.available(), 2);
    }

    #[test]
    fn test_movement_kind_round_trip() {
        for kind in [
            MovementKind::Reserved,
            MovementKind::Released,
            MovementKind::Sale,
            MovementKind::Restock,
            MovementKind::Correction,
            MovementKind::Return,
        ] {
            assert_eq!(MovementKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MovementKind::parse("RESERVED"), None);
    }
}
