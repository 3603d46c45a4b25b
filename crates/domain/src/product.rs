//! Catalog product as seen by the inventory ledger.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::inventory::RejectionReason;
use crate::money::Money;

/// A sellable product with its authoritative stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    /// Units on hand. Unsigned, so stock can never go negative.
    pub stock_quantity: u32,
    pub active: bool,
}

impl Product {
    /// Creates an active product.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, stock_quantity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            stock_quantity,
            active: true,
        }
    }

    /// Returns an inactive copy of this product.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Checks whether this product can supply `requested` units right now.
    pub fn can_supply(&self, requested: u32) -> Result<(), RejectionReason> {
        if !self.active {
            return Err(RejectionReason::Inactive);
        }
        if self.stock_quantity < requested {
            return Err(RejectionReason::Insufficient {
                requested,
                available: self.stock_quantity,
            });
        }
        Ok(())
    }
}
