//! Domain layer for the storefront checkout.
//!
//! This crate holds the value types every other crate speaks:
//! - `Money` as integer minor units
//! - Products, carts and the inventory demand built from them
//! - Addresses and how a checkout selects them
//! - Payment methods and gateway outcomes
//! - Orders with their status state machine

pub mod address;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod inventory;
pub mod money;
pub mod order;
pub mod payment;
pub mod product;

pub use address::{
    Address, AddressPurpose, AddressSelector, AddressType, NewAddress, PostalAddress,
};
pub use cart::{Cart, CartLine};
pub use checkout::CheckoutRequest;
pub use error::DomainError;
pub use inventory::{InventoryDemand, RejectionReason, ReservationResult};
pub use money::Money;
pub use order::{NewOrder, Order, OrderLine, OrderNumber, OrderParts, OrderStatus, TransitionPolicy};
pub use payment::{PaymentMethod, PaymentMethodFields, PaymentOutcome, PaymentStatus};
pub use product::Product;
