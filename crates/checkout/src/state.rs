//! Checkout attempt state machine.

use serde::{Deserialize, Serialize};

/// The progress of a single checkout attempt.
///
/// State transitions:
/// ```text
/// Start ──► CartLoaded ──► InventoryReserved ──► PaymentConfirmed ──► OrderPersisted ──► CartCleared
///   │           │                 │                     │
///   └───────────┴─────────────────┴─────────────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    #[default]
    Start,
    CartLoaded,
    InventoryReserved,
    PaymentConfirmed,
    OrderPersisted,
    CartCleared,
    Failed,
}

impl CheckoutState {
    /// The state reached after a successful step, or `None` from a terminal state.
    pub fn next(&self) -> Option<CheckoutState> {
        match self {
            CheckoutState::Start => Some(CheckoutState::CartLoaded),
            CheckoutState::CartLoaded => Some(CheckoutState::InventoryReserved),
            CheckoutState::InventoryReserved => Some(CheckoutState::PaymentConfirmed),
            CheckoutState::PaymentConfirmed => Some(CheckoutState::OrderPersisted),
            CheckoutState::OrderPersisted => Some(CheckoutState::CartCleared),
            CheckoutState::CartCleared | CheckoutState::Failed => None,
        }
    }

    /// Returns true if a failure from this state must release inventory.
    ///
    /// Once the order is persisted the reservation belongs to the order.
    pub fn holds_reservation(&self) -> bool {
        matches!(
            self,
            CheckoutState::InventoryReserved | CheckoutState::PaymentConfirmed
        )
    }

    /// Returns true if the attempt can still fail.
    pub fn can_fail(&self) -> bool {
        !matches!(
            self,
            CheckoutState::OrderPersisted | CheckoutState::CartCleared | CheckoutState::Failed
        )
    }

    /// The state after a failure: `Failed`, unless the order already exists.
    pub fn fail(self) -> CheckoutState {
        if self.can_fail() {
            CheckoutState::Failed
        } else {
            self
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::CartCleared | CheckoutState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Start => "START",
            CheckoutState::CartLoaded => "CART_LOADED",
            CheckoutState::InventoryReserved => "INVENTORY_RESERVED",
            CheckoutState::PaymentConfirmed => "PAYMENT_CONFIRMED",
            CheckoutState::OrderPersisted => "ORDER_PERSISTED",
            CheckoutState::CartCleared => "CART_CLEARED",
            CheckoutState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_chain() {
        let mut state = CheckoutState::default();
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            state = next;
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                CheckoutState::Start,
                CheckoutState::CartLoaded,
                CheckoutState::InventoryReserved,
                CheckoutState::PaymentConfirmed,
                CheckoutState::OrderPersisted,
                CheckoutState::CartCleared,
            ]
        );
    }

    #[test]
    fn test_reservation_held_until_persisted() {
        assert!(!CheckoutState::CartLoaded.holds_reservation());
        assert!(CheckoutState::InventoryReserved.holds_reservation());
        assert!(CheckoutState::PaymentConfirmed.holds_reservation());
        assert!(!CheckoutState::OrderPersisted.holds_reservation());
    }

    #[test]
    fn test_persisted_attempt_cannot_fail() {
        assert!(CheckoutState::PaymentConfirmed.can_fail());
        assert!(!CheckoutState::OrderPersisted.can_fail());
        assert!(CheckoutState::Failed.is_terminal());
        assert_eq!(CheckoutState::Failed.next(), None);
    }

    #[test]
    fn test_fail_stops_at_persisted_order() {
        assert_eq!(CheckoutState::Start.fail(), CheckoutState::Failed);
        assert_eq!(CheckoutState::PaymentConfirmed.fail(), CheckoutState::Failed);
        assert_eq!(CheckoutState::OrderPersisted.fail(), CheckoutState::OrderPersisted);
        assert_eq!(CheckoutState::CartCleared.fail(), CheckoutState::CartCleared);
    }
}
