//! Checkout error types.

use std::time::Duration;

use common::{OrderId, ProductId, UserId};
use domain::{AddressPurpose, DomainError, OrderStatus, PaymentStatus, RejectionReason};
use store::StoreError;
use thiserror::Error;

/// Errors raised by a payment gateway client.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No API key was configured.
    #[error("Payment gateway API key is not configured")]
    MissingApiKey,

    /// The gateway rejected the credentials.
    #[error("Payment gateway rejected the API key")]
    Unauthorized,

    /// The gateway answered with an error status.
    #[error("Payment gateway error {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("Payment gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a body we could not interpret.
    #[error("Unexpected payment gateway response: {0}")]
    InvalidResponse(String),

    /// The gateway did not answer in time.
    #[error("Payment gateway timed out after {0:?}")]
    Timeout(Duration),

    /// The gateway is down.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by checkout and order management.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// No usable address could be resolved.
    #[error("Missing {kind} address")]
    MissingAddress { kind: AddressPurpose },

    /// The payment method is absent, ambiguous or blank.
    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    /// A product's summed cart quantity is out of range.
    #[error("Invalid cart quantity: {0}")]
    InvalidQuantity(DomainError),

    /// A line total or the order total is out of range.
    #[error("Invalid order amount: {0}")]
    InvalidAmount(DomainError),

    /// The inventory ledger rejected the reservation.
    #[error("Insufficient stock for product {product_id}: {reason}")]
    InsufficientStock {
        product_id: ProductId,
        reason: RejectionReason,
    },

    /// The gateway declined, errored or timed out.
    #[error("Payment failed ({status}): {reason}")]
    PaymentFailed {
        status: PaymentStatus,
        reason: String,
    },

    /// Every generated order number was already taken.
    #[error("Could not generate a unique order number after {attempts} attempts")]
    OrderNumberGeneration { attempts: u32 },

    /// Storage failed after the reservation was made.
    #[error("Order persistence failed: {0}")]
    Persistence(StoreError),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order belongs to another user.
    #[error("User {user_id} may not access order {order_id}")]
    AccessDenied { order_id: OrderId, user_id: UserId },

    /// The status change is not allowed by the transition policy.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Storage failed before any inventory was reserved.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Returns true if resubmitting the same request may succeed.
    ///
    /// Precondition failures (empty cart, bad address or payment method,
    /// missing stock) and order management errors need the caller to change
    /// something first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::PaymentFailed { .. }
                | CheckoutError::OrderNumberGeneration { .. }
                | CheckoutError::Persistence(_)
                | CheckoutError::Store(_)
        )
    }

    /// Short label used as the `reason` of failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::MissingAddress { .. } => "missing_address",
            CheckoutError::InvalidPaymentMethod(_) => "invalid_payment_method",
            CheckoutError::InvalidQuantity(_) => "invalid_quantity",
            CheckoutError::InvalidAmount(_) => "invalid_amount",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::PaymentFailed { .. } => "payment_failed",
            CheckoutError::OrderNumberGeneration { .. } => "order_number_generation",
            CheckoutError::Persistence(_) => "persistence",
            CheckoutError::OrderNotFound(_) => "order_not_found",
            CheckoutError::AccessDenied { .. } => "access_denied",
            CheckoutError::InvalidStatusTransition { .. } => "invalid_status_transition",
            CheckoutError::Store(_) => "store",
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
