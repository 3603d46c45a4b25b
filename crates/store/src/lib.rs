//! Storage for the storefront checkout.
//!
//! Each collaborator the checkout needs is a trait in [`store`] with an
//! in-memory implementation for tests and a PostgreSQL implementation.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryAddressStore, InMemoryCartStore, InMemoryOrderStore, InMemoryProductStore};
pub use postgres::PostgresStore;
pub use store::{AddressStore, CartStore, OrderStore, ProductStore};
