//! Checkout orchestration for the storefront.
//!
//! A checkout turns a user's cart into a confirmed order:
//! 1. Validate the payment method and resolve addresses
//! 2. Reserve inventory for the whole cart
//! 3. Charge or confirm the payment
//! 4. Persist the order and clear the cart
//!
//! If payment or persistence fails the reservation is released.

pub mod address;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod order_number;
pub mod orders;
pub mod services;
pub mod state;
pub mod telemetry;

pub use address::{AddressResolver, ResolvedAddress};
pub use config::{CheckoutConfig, GatewayConfig};
pub use coordinator::CheckoutCoordinator;
pub use error::{CheckoutError, GatewayError, Result};
pub use order_number::{OrderNumberSource, RandomOrderNumbers};
pub use orders::OrderManager;
pub use services::{
    ChargeRequest, InMemoryPaymentGateway, InventoryLedger, LockingInventoryLedger,
    PaymentGateway, PostgresInventoryLedger, StripeGateway, check_demand,
};
pub use state::CheckoutState;
