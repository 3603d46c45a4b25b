//! Inventory demand and reservation outcomes.

use std::collections::BTreeMap;

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::error::DomainError;

/// Requested quantity per product.
///
/// Entries are kept in ascending product-id order. Every ledger walks the
/// demand in this order for both its check and mutation passes, and the
/// PostgreSQL ledger acquires row locks in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDemand {
    quantities: BTreeMap<ProductId, u32>,
}

impl InventoryDemand {
    /// Creates an empty demand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Demand for a single product.
    pub fn single(product_id: ProductId, quantity: u32) -> Self {
        Self {
            quantities: BTreeMap::from([(product_id, quantity)]),
        }
    }

    /// Builds demand from cart lines, summing repeated products.
    pub fn from_lines<'a>(
        lines: impl IntoIterator<Item = &'a CartLine>,
    ) -> Result<Self, DomainError> {
        Self::from_entries(lines.into_iter().map(|line| (line.product_id, line.quantity)))
    }

    /// Builds demand from `(product, quantity)` pairs, summing repeated products.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (ProductId, u32)>,
    ) -> Result<Self, DomainError> {
        let mut demand = Self::new();
        for (product_id, quantity) in entries {
            demand.add(product_id, quantity)?;
        }
        Ok(demand)
    }

    /// Adds `quantity` units of a product to the demand.
    ///
    /// Fails with `QuantityOverflow` if the product's total would not fit a
    /// `u32`; the demand is left unchanged.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) -> Result<(), DomainError> {
        let entry = self.quantities.entry(product_id).or_insert(0);
        *entry = entry
            .checked_add(quantity)
            .ok_or(DomainError::QuantityOverflow { product_id })?;
        Ok(())
    }

    /// Returns the requested quantity for a product, if present.
    pub fn quantity(&self, product_id: ProductId) -> Option<u32> {
        self.quantities.get(&product_id).copied()
    }

    /// Iterates `(product, quantity)` in ascending product order.
    pub fn iter(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.quantities.iter().map(|(id, qty)| (*id, *qty))
    }

    /// Returns the product ids in ascending order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.quantities.keys().copied().collect()
    }

    /// Number of distinct products.
    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    /// Total units across all products.
    pub fn total_units(&self) -> u64 {
        self.quantities.values().map(|q| u64::from(*q)).sum()
    }
}

/// Why a product could not satisfy its share of a demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// The product does not exist.
    Missing,
    /// The product exists but is not for sale.
    Inactive,
    /// Not enough units on hand.
    Insufficient { requested: u32, available: u32 },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::Missing => write!(f, "product not found"),
            RejectionReason::Inactive => write!(f, "product is not active"),
            RejectionReason::Insufficient {
                requested,
                available,
            } => write!(
                f,
                "insufficient stock (requested {requested}, available {available})"
            ),
        }
    }
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationResult {
    /// Every product was decremented by its requested quantity.
    Reserved,
    /// Nothing was mutated; `product_id` is the first offender in demand order.
    Rejected {
        product_id: ProductId,
        reason: RejectionReason,
    },
}

impl ReservationResult {
    /// Returns true if the reservation succeeded.
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationResult::Reserved)
    }

    /// Returns the outcome label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationResult::Reserved => "reserved",
            ReservationResult::Rejected {
                reason: RejectionReason::Missing,
                ..
            } => "missing",
            ReservationResult::Rejected {
                reason: RejectionReason::Inactive,
                ..
            } => "inactive",
            ReservationResult::Rejected {
                reason: RejectionReason::Insufficient { .. },
                ..
            } => "insufficient",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    #[test]
    fn test_duplicate_lines_are_summed() {
        let lines = vec![
            CartLine::new(ProductId::new(2), "Tea", 1, Money::from_cents(550)).unwrap(),
            CartLine::new(ProductId::new(1), "Mug", 2, Money::from_cents(1999)).unwrap(),
            CartLine::new(ProductId::new(2), "Tea", 4, Money::from_cents(550)).unwrap(),
        ];

        let demand = InventoryDemand::from_lines(&lines).unwrap();

        assert_eq!(demand.len(), 2);
        assert_eq!(demand.quantity(ProductId::new(2)), Some(5));
        assert_eq!(demand.quantity(ProductId::new(1)), Some(2));
        assert_eq!(demand.total_units(), 7);
    }

    #[test]
    fn test_overflowing_add_is_rejected_and_leaves_demand_unchanged() {
        let mut demand = InventoryDemand::new();
        demand.add(ProductId::new(1), u32::MAX - 1).unwrap();

        let result = demand.add(ProductId::new(1), 2);

        assert_eq!(
            result,
            Err(DomainError::QuantityOverflow {
                product_id: ProductId::new(1)
            })
        );
        assert_eq!(demand.quantity(ProductId::new(1)), Some(u32::MAX - 1));
        demand.add(ProductId::new(1), 1).unwrap();
        assert_eq!(demand.quantity(ProductId::new(1)), Some(u32::MAX));
    }

    #[test]
    fn test_iteration_is_in_product_order() {
        let demand = InventoryDemand::from_entries([
            (ProductId::new(30), 1),
            (ProductId::new(10), 1),
            (ProductId::new(20), 1),
        ])
        .unwrap();

        assert_eq!(
            demand.product_ids(),
            vec![ProductId::new(10), ProductId::new(20), ProductId::new(30)]
        );
    }

    #[test]
    fn test_reservation_labels() {
        assert_eq!(ReservationResult::Reserved.as_str(), "reserved");
        let rejected = ReservationResult::Rejected {
            product_id: ProductId::new(1),
            reason: RejectionReason::Insufficient {
                requested: 2,
                available: 1,
            },
        };
        assert!(!rejected.is_reserved());
        assert_eq!(rejected.as_str(), "insufficient");
    }

    #[test]
    fn test_rejection_reason_display() {
        assert_eq!(
            RejectionReason::Insufficient {
                requested: 3,
                available: 1
            }
            .to_string(),
            "insufficient stock (requested 3, available 1)"
        );
        assert_eq!(RejectionReason::Missing.to_string(), "product not found");
    }
}
