//! Orders and their status lifecycle.

mod model;
mod number;
mod status;

pub use model::{NewOrder, Order, OrderLine, OrderParts};
pub use number::OrderNumber;
pub use status::{OrderStatus, TransitionPolicy};
