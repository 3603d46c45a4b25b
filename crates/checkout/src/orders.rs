//! Order queries and status management.

use chrono::Utc;
use common::{OrderId, UserId};
use domain::{Order, OrderStatus, TransitionPolicy};
use store::{OrderStore, StoreError};

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};

/// Reloads allowed when another writer changes the status first.
const STATUS_WRITE_ATTEMPTS: u32 = 3;

/// Reads orders and moves them through their status lifecycle.
#[derive(Clone)]
pub struct OrderManager<O: OrderStore> {
    store: O,
    policy: TransitionPolicy,
}

impl<O: OrderStore> OrderManager<O> {
    /// Creates a manager using the strict transition table.
    pub fn new(store: O) -> Self {
        Self::with_policy(store, TransitionPolicy::Strict)
    }

    pub fn with_policy(store: O, policy: TransitionPolicy) -> Self {
        Self { store, policy }
    }

    /// Creates a manager using the configured `status_policy`.
    pub fn from_config(store: O, config: &CheckoutConfig) -> Self {
        Self::with_policy(store, config.status_policy)
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Moves an order to `new_status`.
    ///
    /// Stamps `shipped_at` on SHIPPED and `delivered_at` on DELIVERED. Nothing
    /// else changes: cancelling does not return stock.
    ///
    /// The write only lands if the stored status is still the one the
    /// transition was checked against. When a concurrent update wins, the
    /// order is reloaded and the transition is checked again.
    #[tracing::instrument(skip(self), fields(policy = self.policy.as_str()))]
    pub async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let mut attempt = 1;
        loop {
            let mut order = self.get_order(order_id).await?;
            let previous = order.status();

            order
                .transition_to(new_status, self.policy, Utc::now())
                .map_err(|_| CheckoutError::InvalidStatusTransition {
                    from: previous,
                    to: new_status,
                })?;

            match self.store.update(&order, previous).await {
                Ok(()) => {
                    tracing::info!(
                        order_number = %order.order_number(),
                        from = %previous,
                        to = %new_status,
                        "order status updated"
                    );
                    return Ok(order);
                }
                Err(StoreError::StatusConflict { .. }) if attempt < STATUS_WRITE_ATTEMPTS => {
                    tracing::debug!(attempt, from = %previous, "order status changed concurrently, reloading");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Returns the order or `OrderNotFound`.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .find_by_id(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    /// The user's orders, newest first.
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.find_by_user(user_id).await?)
    }

    /// Every order, newest first.
    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.find_all().await?)
    }

    /// Returns the order only if `user_id` owns it.
    pub async fn order_for_user(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        if order.user_id() != user_id {
            return Err(CheckoutError::AccessDenied { order_id, user_id });
        }
        Ok(order)
    }
}
