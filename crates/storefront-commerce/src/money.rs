//! Money type for representing monetary values.
//!
//! Amounts are stored as integer cents (fixed point, two fractional
//! digits) to avoid the floating-point precision issues that plague
//! monetary calculations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// A monetary amount in cents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Money = Money(0);

    /// Create a Money value from cents.
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Create a Money value from whole dollars and cents.
    ///
    /// ```
    /// use storefront_commerce::Money;
    /// assert_eq!(Money::from_dollars(49, 99), Money::new(4999));
    /// ```
    pub const fn from_dollars(dollars: i64, cents: i64) -> Self {
        Self(dollars * 100 + cents)
    }

    /// Amount in cents.
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Check if this is zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Check if this is negative.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Checked multiplication by a quantity.
    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// Calculate a percentage of this amount, rounded to the nearest cent.
    ///
    /// ```
    /// use storefront_commerce::Money;
    /// assert_eq!(Money::new(10000).percentage(10.0), Money::new(1000));
    /// ```
    pub fn percentage(self, percent: f64) -> Money {
        self.multiply_rate(percent / 100.0)
    }

    /// Multiply by a fractional rate (e.g. a tax rate), rounded to the
    /// nearest cent.
    pub fn multiply_rate(self, rate: f64) -> Money {
        Money((self.0 as f64 * rate).round() as i64)
    }

    /// The smaller of two amounts.
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// The larger of two amounts.
    pub fn max(self, other: Money) -> Money {
        Money(self.0.max(other.0))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}
