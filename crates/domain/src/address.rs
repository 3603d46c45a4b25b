//! Saved addresses and checkout address selection.

use common::{AddressId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// What a saved address may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    Shipping,
    Billing,
    #[default]
    Both,
}

impl AddressType {
    /// Returns true if an address of this type can serve `purpose`.
    pub fn serves(&self, purpose: AddressPurpose) -> bool {
        match self {
            AddressType::Both => true,
            AddressType::Shipping => purpose == AddressPurpose::Shipping,
            AddressType::Billing => purpose == AddressPurpose::Billing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Shipping => "SHIPPING",
            AddressType::Billing => "BILLING",
            AddressType::Both => "BOTH",
        }
    }

    /// Parses the stored representation; unknown values fall back to `Both`.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "SHIPPING" => AddressType::Shipping,
            "BILLING" => AddressType::Billing,
            _ => AddressType::Both,
        }
    }
}

/// The role an address plays on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressPurpose {
    Shipping,
    Billing,
}

impl AddressPurpose {
    /// Address type to store when saving an inline address for this purpose.
    pub fn address_type(&self) -> AddressType {
        match self {
            AddressPurpose::Shipping => AddressType::Shipping,
            AddressPurpose::Billing => AddressType::Billing,
        }
    }
}

impl std::fmt::Display for AddressPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressPurpose::Shipping => write!(f, "shipping"),
            AddressPurpose::Billing => write!(f, "billing"),
        }
    }
}

/// Street-level address fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl PostalAddress {
    /// Checks that every required field is present.
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidAddress(format!("{field} is required")));
            }
        }
        Ok(())
    }

    /// Returns true if both addresses name the same place, ignoring case and
    /// surrounding whitespace.
    pub fn same_as(&self, other: &PostalAddress) -> bool {
        fn eq(a: &str, b: &str) -> bool {
            a.trim().eq_ignore_ascii_case(b.trim())
        }

        eq(&self.line1, &other.line1)
            && eq(&self.city, &other.city)
            && eq(&self.state, &other.state)
            && eq(&self.postal_code, &other.postal_code)
            && eq(&self.country, &other.country)
            && eq(
                self.line2.as_deref().unwrap_or_default(),
                other.line2.as_deref().unwrap_or_default(),
            )
    }

    /// Single-line form stored on orders: `line1[, line2], city, state postal, country`.
    pub fn formatted(&self) -> String {
        let line2 = match self.line2.as_deref().map(str::trim) {
            Some(line2) if !line2.is_empty() => format!(", {line2}"),
            _ => String::new(),
        };
        format!(
            "{}{}, {}, {} {}, {}",
            self.line1, line2, self.city, self.state, self.postal_code, self.country
        )
    }
}

/// An address saved in a user's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub postal: PostalAddress,
    pub address_type: AddressType,
    pub is_default: bool,
}

/// An address that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub user_id: UserId,
    pub postal: PostalAddress,
    pub address_type: AddressType,
    pub is_default: bool,
}

/// How a checkout request names its shipping or billing address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressSelector {
    /// An address typed in with the request, optionally saved afterwards.
    Inline {
        address: PostalAddress,
        #[serde(default)]
        save: bool,
    },
    /// A saved address owned by the user.
    Saved { id: AddressId },
    /// The user's default address for the purpose.
    Default,
}

impl AddressSelector {
    /// Convenience for an inline address that is not saved.
    pub fn inline(address: PostalAddress) -> Self {
        AddressSelector::Inline {
            address,
            save: false,
        }
    }

    pub fn saved(id: AddressId) -> Self {
        AddressSelector::Saved { id }
    }
}
