//! External collaborators of the checkout: inventory and payments.

pub mod inventory;
pub mod inventory_postgres;
pub mod payment;
pub mod stripe;

pub use inventory::{InventoryLedger, LockingInventoryLedger, check_demand};
pub use inventory_postgres::PostgresInventoryLedger;
pub use payment::{ChargeRequest, InMemoryPaymentGateway, PaymentGateway};
pub use stripe::StripeGateway;
