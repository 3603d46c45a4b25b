//! Order header and line snapshots.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

use super::{OrderNumber, OrderStatus, TransitionPolicy};

/// Immutable snapshot of a purchased product at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderLine {
    /// Creates a line, computing `line_total = unit_price * quantity`.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            line_total: unit_price.checked_mul(quantity)?,
        })
    }
}

/// An order ready to be persisted. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub payment_method: String,
    pub shipping_address: String,
    pub billing_address: String,
    pub payment_reference: Option<String>,
}

impl NewOrder {
    /// Builds a confirmed order whose total is the sum of its line totals.
    pub fn confirmed(
        order_number: OrderNumber,
        user_id: UserId,
        lines: Vec<OrderLine>,
        payment_method: impl Into<String>,
        shipping_address: impl Into<String>,
        billing_address: impl Into<String>,
        payment_reference: Option<String>,
    ) -> Result<Self, DomainError> {
        let total_amount = Money::checked_sum(lines.iter().map(|line| line.line_total))?;
        Ok(Self {
            order_number,
            user_id,
            lines,
            total_amount,
            status: OrderStatus::Confirmed,
            payment_method: payment_method.into(),
            shipping_address: shipping_address.into(),
            billing_address: billing_address.into(),
            payment_reference,
        })
    }

    /// Materializes the order with the id and creation time chosen by a store.
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            order_number: self.order_number,
            user_id: self.user_id,
            lines: self.lines,
            total_amount: self.total_amount,
            status: self.status,
            payment_method: self.payment_method,
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            payment_reference: self.payment_reference,
            created_at,
            updated_at: created_at,
            shipped_at: None,
            delivered_at: None,
        }
    }
}

/// Every persisted column of an order, used by stores to rebuild one.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub payment_method: String,
    pub shipping_address: String,
    pub billing_address: String,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// A persisted order.
///
/// Lines are only readable; the only mutation is a status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: OrderNumber,
    user_id: UserId,
    lines: Vec<OrderLine>,
    total_amount: Money,
    status: OrderStatus,
    payment_method: String,
    shipping_address: String,
    billing_address: String,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
}

impl From<OrderParts> for Order {
    fn from(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            order_number: parts.order_number,
            user_id: parts.user_id,
            lines: parts.lines,
            total_amount: parts.total_amount,
            status: parts.status,
            payment_method: parts.payment_method,
            shipping_address: parts.shipping_address,
            billing_address: parts.billing_address,
            payment_reference: parts.payment_reference,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            shipped_at: parts.shipped_at,
            delivered_at: parts.delivered_at,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &str {
        &self.billing_address
    }

    /// Gateway reference id of the payment that confirmed this order.
    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    /// Total quantity of all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

// Command methods
impl Order {
    /// Moves the order to `next`, stamping `shipped_at` / `delivered_at` when
    /// entering those statuses. No other field changes.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.status.check_transition(next, policy)?;

        self.status = next;
        self.updated_at = now;
        match next {
            OrderStatus::Shipped => self.shipped_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            _ => {}
        }
        Ok(())
    }
}
