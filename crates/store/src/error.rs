use common::{AddressId, OrderId, ProductId, UserId};
use domain::OrderStatus;
use thiserror::Error;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product was not found.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The address was not found.
    #[error("Address not found: {0}")]
    AddressNotFound(AddressId),

    /// The user's cart has no line for the product.
    #[error("Cart of user {user_id} has no line for product {product_id}")]
    CartLineNotFound {
        user_id: UserId,
        product_id: ProductId,
    },

    /// The order's stored status changed since it was read.
    #[error("Order {order_id} is no longer {expected}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
    },

    /// Another order already uses this order number.
    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(String),

    /// A stored row could not be turned back into a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// The backend refused the operation without a database error.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
