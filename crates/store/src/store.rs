use async_trait::async_trait;
use common::{AddressId, OrderId, ProductId, UserId};
use domain::{
    Address, AddressPurpose, Cart, CartLine, NewAddress, NewOrder, Order, OrderNumber, OrderStatus,
    Product,
};

use crate::Result;

/// Catalog storage.
///
/// Stock is only changed through `set_stock`, which inventory ledgers call
/// while holding their own lock.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Retrieves a product by id.
    async fn get(&self, id: ProductId) -> Result<Option<Product>>;

    /// Inserts or replaces a product.
    async fn save(&self, product: Product) -> Result<()>;

    /// Overwrites the stock count of an existing product.
    ///
    /// Fails with `ProductNotFound` if the product does not exist.
    async fn set_stock(&self, id: ProductId, stock_quantity: u32) -> Result<()>;
}

/// Per-user shopping carts.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the user's cart; a user without one gets an empty cart.
    async fn get_cart(&self, user_id: UserId) -> Result<Cart>;

    /// Adds a line. Adding a product already in the cart increases its
    /// quantity and refreshes the name and price snapshot.
    async fn add_line(&self, user_id: UserId, line: CartLine) -> Result<()>;

    /// Removes the line for a product.
    async fn remove_line(&self, user_id: UserId, product_id: ProductId) -> Result<()>;

    /// Removes every line of the user's cart.
    async fn clear(&self, user_id: UserId) -> Result<()>;
}

/// Saved user addresses.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Retrieves an address by id regardless of owner.
    async fn find_by_id(&self, id: AddressId) -> Result<Option<Address>>;

    /// Returns the user's default address able to serve `purpose`.
    ///
    /// A default of type `Both` matches either purpose; ties go to the lowest id.
    async fn find_default(&self, user_id: UserId, purpose: AddressPurpose)
    -> Result<Option<Address>>;

    /// Lists the user's addresses, defaults first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>>;

    /// Stores a new address and returns it with its id.
    ///
    /// Saving a default clears the default flag of the user's other addresses
    /// of the same type (all of them when the type is `Both`).
    async fn save(&self, address: NewAddress) -> Result<Address>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists the order header and its lines atomically.
    ///
    /// Assigns the id and timestamps. Fails with `DuplicateOrderNumber` if the
    /// number is already taken.
    async fn save(&self, order: NewOrder) -> Result<Order>;

    /// Writes back the mutable header fields (status and timestamps) if the
    /// stored status is still `expected`.
    ///
    /// Fails with `StatusConflict` when another writer got there first.
    async fn update(&self, order: &Order, expected: OrderStatus) -> Result<()>;

    /// Retrieves an order by id.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists the user's orders, newest first.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Lists every order, newest first.
    async fn find_all(&self) -> Result<Vec<Order>>;

    /// Returns true if an order already uses this number.
    async fn exists_by_order_number(&self, order_number: &OrderNumber) -> Result<bool>;
}
