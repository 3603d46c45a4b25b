//! Checkout request payload.

use serde::{Deserialize, Serialize};

use crate::address::AddressSelector;
use crate::payment::PaymentMethod;

/// Everything a user submits to turn their cart into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub shipping: AddressSelector,
    pub billing: AddressSelector,
    /// Receipt address forwarded to the payment gateway.
    #[serde(default)]
    pub customer_email: Option<String>,
}

impl CheckoutRequest {
    /// Request using the user's default shipping and billing addresses.
    pub fn with_default_addresses(payment_method: PaymentMethod) -> Self {
        Self {
            payment_method,
            shipping: AddressSelector::Default,
            billing: AddressSelector::Default,
            customer_email: None,
        }
    }
}
