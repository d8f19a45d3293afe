//! Newtype IDs for type-safe identifiers.
//!
//! Using newtypes prevents accidentally mixing up different ID types,
//! e.g., passing a ProductId where an OrderId is expected. The store
//! assigns values from SQLite rowids, so the underlying type is `i64`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate newtype ID structs over row ids.
macro_rules! define_id {
    ($name:ident) => {
        /// A unique identifier.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create an ID from a raw row id.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Get the raw row id.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(ProductId);
define_id!(UserId);
define_id!(CartItemId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(CouponId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        let id = ProductId::new(42);
        assert_eq!(id.get(), 42);
        assert_eq!(format!("{}", id), "42");
    }

    #[test]
    fn test_id_equality() {
        assert_eq!(OrderId::new(7), OrderId::from(7));
        assert_ne!(OrderId::new(7), OrderId::new(8));
    }
}
