//! Shipping and billing addresses.

use crate::error::CommerceError;
use serde::{Deserialize, Serialize};

/// A postal address.
///
/// Orders snapshot the address at placement time; later edits to a saved
/// address never touch existing orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    /// Contact phone, optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    /// Check that every required field is non-blank.
    pub fn validate(&self) -> Result<(), CommerceError> {
        let required: [(&'static str, &str); 5] = [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CommerceError::InvalidAddress { missing: field });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            street: "123 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_complete_address_valid() {
        assert!(address().validate().is_ok());
    }

    #[test]
    fn test_blank_field_rejected() {
        let mut a = address();
        a.postal_code = "   ".to_string();
        assert_eq!(
            a.validate(),
            Err(CommerceError::InvalidAddress {
                missing: "postal_code"
            })
        );
    }

    #[test]
    fn test_phone_optional() {
        let mut a = address();
        a.phone = Some("+1 555 0100".to_string());
        assert!(a.validate().is_ok());

        // Absent phone does not appear in serialized form
        let json = serde_json::to_string(&address()).unwrap();
        assert!(!json.contains("phone"));
    }
}
