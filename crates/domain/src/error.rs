//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised while validating or mutating domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A money string could not be parsed as a fixed-point amount.
    #[error("Invalid money amount: {0:?}")]
    InvalidMoney(String),

    /// A money computation left the representable range.
    #[error("Money amount out of range")]
    AmountOverflow,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Summed demand for a product does not fit a quantity.
    #[error("Quantity out of range for product {product_id}")]
    QuantityOverflow { product_id: ProductId },

    /// The payment method could not be resolved to exactly one method.
    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    /// An inline address is missing required fields.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The requested status change is not in the transition table.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// A status string did not name a known order status.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
