//! Identifier types shared by every storefront crate.

mod types;

pub use types::{AddressId, OrderId, ProductId, UserId};
