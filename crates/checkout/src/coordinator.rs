//! Checkout coordinator: turns a user's cart into a confirmed order.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::UserId;
use domain::{
    AddressPurpose, Cart, CheckoutRequest, DomainError, InventoryDemand, Money, NewOrder, Order, OrderLine,
    OrderNumber, PaymentMethod, PaymentOutcome, PaymentStatus, ReservationResult,
};
use store::{AddressStore, CartStore, OrderStore};

use crate::address::{AddressResolver, ResolvedAddress};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, GatewayError, Result};
use crate::order_number::{OrderNumberSource, RandomOrderNumbers};
use crate::services::inventory::InventoryLedger;
use crate::services::payment::{ChargeRequest, PaymentGateway};
use crate::state::CheckoutState;
use crate::telemetry::{CHECKOUT_ATTEMPTS, CHECKOUT_COMPLETED, CHECKOUT_DURATION, CHECKOUT_FAILED};

/// Orchestrates one checkout attempt per call.
///
/// Inventory is reserved before payment and released again if anything fails
/// before the order is persisted. A persisted order owns its stock.
pub struct CheckoutCoordinator<C, O, A, L, G>
where
    C: CartStore,
    O: OrderStore,
    A: AddressStore,
    L: InventoryLedger,
    G: PaymentGateway,
{
    carts: C,
    orders: O,
    addresses: AddressResolver<A>,
    ledger: L,
    gateway: G,
    order_numbers: Arc<dyn OrderNumberSource>,
    config: CheckoutConfig,
}

/// Everything resolved before inventory is touched.
struct Preconditions {
    shipping: ResolvedAddress,
    billing: ResolvedAddress,
}

impl<C, O, A, L, G> CheckoutCoordinator<C, O, A, L, G>
where
    C: CartStore,
    O: OrderStore,
    A: AddressStore,
    L: InventoryLedger,
    G: PaymentGateway,
{
    /// Creates a coordinator with the default configuration.
    pub fn new(carts: C, orders: O, addresses: A, ledger: L, gateway: G) -> Self {
        Self {
            carts,
            orders,
            addresses: AddressResolver::new(addresses),
            ledger,
            gateway,
            order_numbers: Arc::new(RandomOrderNumbers),
            config: CheckoutConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the order number generator.
    pub fn with_order_numbers(mut self, source: impl OrderNumberSource + 'static) -> Self {
        self.order_numbers = Arc::new(source);
        self
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Converts the user's cart into a confirmed order.
    ///
    /// On failure no order exists, the cart is untouched and any reserved
    /// inventory has been released.
    #[tracing::instrument(skip_all, fields(%user_id, payment_method = request.payment_method.label()))]
    pub async fn checkout(&self, user_id: UserId, request: CheckoutRequest) -> Result<Order> {
        metrics::counter!(CHECKOUT_ATTEMPTS).increment(1);
        let started = Instant::now();

        let (result, state) = self.run(user_id, &request).await;

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!(CHECKOUT_DURATION).record(duration);
        match &result {
            Ok(order) => {
                metrics::counter!(CHECKOUT_COMPLETED).increment(1);
                tracing::info!(
                    order_number = %order.order_number(),
                    total = %order.total_amount(),
                    %state,
                    duration,
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!(CHECKOUT_FAILED, "reason" => e.reason()).increment(1);
                tracing::warn!(reason = e.reason(), error = %e, %state, "checkout failed");
            }
        }
        result
    }

    /// Runs one attempt and returns its outcome with the state it ended in.
    async fn run(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> (Result<Order>, CheckoutState) {
        let mut state = CheckoutState::Start;
        let result = self.attempt(user_id, request, &mut state).await;
        if let Err(e) = &result {
            tracing::debug!(failed_at = %state, reason = e.reason(), "checkout attempt failed");
            state = state.fail();
        }
        (result, state)
    }

    async fn attempt(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
        state: &mut CheckoutState,
    ) -> Result<Order> {
        // 0. Preconditions
        let pre = self.preconditions(user_id, request).await?;

        // 1. Load the cart snapshot
        let cart = self.carts.get_cart(user_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        self.advance(state, CheckoutState::CartLoaded);

        // 2. Build demand, lines and total from the cart's price snapshot
        let demand =
            InventoryDemand::from_lines(&cart.lines).map_err(CheckoutError::InvalidQuantity)?;
        let lines = order_lines(&cart, &demand).map_err(CheckoutError::InvalidAmount)?;
        let total = Money::checked_sum(lines.iter().map(|l| l.line_total))
            .map_err(CheckoutError::InvalidAmount)?;

        // 3. Reserve
        if let ReservationResult::Rejected { product_id, reason } =
            self.ledger.reserve(&demand).await?
        {
            return Err(CheckoutError::InsufficientStock { product_id, reason });
        }
        self.advance(state, CheckoutState::InventoryReserved);

        let result = self
            .after_reservation(user_id, request, lines, total, pre, state)
            .await;
        if result.is_err() && state.holds_reservation() {
            self.compensate(&demand).await;
        }
        result
    }

    async fn preconditions(&self, user_id: UserId, request: &CheckoutRequest) -> Result<Preconditions> {
        request
            .payment_method
            .validate()
            .map_err(|e| CheckoutError::InvalidPaymentMethod(e.to_string()))?;

        let shipping = self
            .addresses
            .resolve(user_id, AddressPurpose::Shipping, &request.shipping)
            .await?;
        let billing = self
            .addresses
            .resolve(user_id, AddressPurpose::Billing, &request.billing)
            .await?;

        Ok(Preconditions { shipping, billing })
    }

    /// Every error returned here while `state` still holds the
    /// reservation is compensated by the caller.
    async fn after_reservation(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
        lines: Vec<OrderLine>,
        total: Money,
        pre: Preconditions,
        state: &mut CheckoutState,
    ) -> Result<Order> {
        // 4-6. Payment
        let payment = self.pay(request, total).await?;
        self.advance(state, CheckoutState::PaymentConfirmed);

        // 7. Order number
        let order_number = self.assign_order_number().await?;

        // 8. Persist
        let new_order = NewOrder::confirmed(
            order_number,
            user_id,
            lines,
            request.payment_method.label(),
            pre.shipping.formatted,
            pre.billing.formatted,
            Some(payment.reference_id.clone()),
        )
        .map_err(CheckoutError::InvalidAmount)?;
        let order = self.orders.save(new_order).await.map_err(|e| {
            tracing::error!(
                payment_reference = %payment.reference_id,
                amount = %total,
                error = %e,
                "order persistence failed after successful payment"
            );
            CheckoutError::Persistence(e)
        })?;
        self.advance(state, CheckoutState::OrderPersisted);

        // 9. Clear the cart; the order stands even if this fails
        match self.carts.clear(user_id).await {
            Ok(()) => self.advance(state, CheckoutState::CartCleared),
            Err(e) => tracing::warn!(
                order_number = %order.order_number(),
                error = %e,
                "cart not cleared after checkout"
            ),
        }

        // 10. Inline addresses the user asked to keep
        for (purpose, address) in [
            (AddressPurpose::Shipping, pre.shipping.save),
            (AddressPurpose::Billing, pre.billing.save),
        ] {
            if let Some(postal) = address {
                if let Err(e) = self.addresses.remember(user_id, purpose, postal).await {
                    tracing::warn!(%purpose, error = %e, "checkout address not saved");
                }
            }
        }

        Ok(order)
    }

    /// Charges or confirms according to the payment method, bounded by the
    /// configured timeout. Anything but a successful outcome is `PaymentFailed`.
    async fn pay(&self, request: &CheckoutRequest, amount: Money) -> Result<PaymentOutcome> {
        let charge = |payment_method: &str| ChargeRequest {
            amount,
            currency: self.config.currency.clone(),
            payment_method: payment_method.to_string(),
            customer_email: request.customer_email.clone(),
        };

        let call = async {
            match &request.payment_method {
                PaymentMethod::CardToken { token } => self.gateway.charge(charge(token)).await,
                PaymentMethod::PaymentIntent { intent_id } => self.gateway.confirm(intent_id).await,
                PaymentMethod::Other { reference, .. } => {
                    self.gateway.charge(charge(reference)).await
                }
            }
        };

        let outcome = tokio::time::timeout(self.config.payment_timeout, call)
            .await
            .unwrap_or(Err(GatewayError::Timeout(self.config.payment_timeout)))
            .map_err(|e| CheckoutError::PaymentFailed {
                status: PaymentStatus::Failed,
                reason: e.to_string(),
            })?;

        if !outcome.is_success() {
            return Err(CheckoutError::PaymentFailed {
                status: outcome.status,
                reason: outcome
                    .failure_reason
                    .unwrap_or_else(|| format!("payment {}", outcome.status)),
            });
        }

        tracing::info!(reference_id = %outcome.reference_id, status = %outcome.status, "payment accepted");
        Ok(outcome)
    }

    async fn assign_order_number(&self) -> Result<OrderNumber> {
        let attempts = self.config.max_order_number_attempts;
        for attempt in 1..=attempts {
            let candidate = self.order_numbers.next(Utc::now());
            let taken = self
                .orders
                .exists_by_order_number(&candidate)
                .await
                .map_err(CheckoutError::Persistence)?;
            if !taken {
                return Ok(candidate);
            }
            tracing::debug!(attempt, %candidate, "order number already taken");
        }
        Err(CheckoutError::OrderNumberGeneration { attempts })
    }

    async fn compensate(&self, demand: &InventoryDemand) {
        match self.ledger.release(demand).await {
            Ok(()) => tracing::info!(units = demand.total_units(), "reserved inventory released"),
            Err(e) => tracing::error!(error = %e, ?demand, "failed to release reserved inventory"),
        }
    }

    fn advance(&self, state: &mut CheckoutState, to: CheckoutState) {
        debug_assert_eq!(state.next(), Some(to));
        tracing::debug!(from = %state, %to, "checkout state");
        *state = to;
    }
}

/// One order line per demand entry, named and priced from the first cart
/// line of that product.
fn order_lines(
    cart: &Cart,
    demand: &InventoryDemand,
) -> std::result::Result<Vec<OrderLine>, DomainError> {
    demand
        .iter()
        .filter_map(|(product_id, quantity)| {
            cart.lines
                .iter()
                .find(|line| line.product_id == product_id)
                .map(|line| {
                    OrderLine::new(product_id, line.product_name.clone(), quantity, line.unit_price)
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;
    use domain::{AddressType, CartLine, NewAddress, PostalAddress, Product};
    use store::{
        InMemoryAddressStore, InMemoryCartStore, InMemoryOrderStore, InMemoryProductStore,
        ProductStore,
    };

    use crate::services::{InMemoryPaymentGateway, LockingInventoryLedger};

    const MUG: ProductId = ProductId::new(1);

    type TestCoordinator = CheckoutCoordinator<
        InMemoryCartStore,
        InMemoryOrderStore,
        InMemoryAddressStore,
        LockingInventoryLedger<InMemoryProductStore>,
        InMemoryPaymentGateway,
    >;

    /// A coordinator over 10 mugs, and a user with a default address.
    async fn coordinator() -> (TestCoordinator, InMemoryCartStore, InMemoryProductStore, UserId) {
        let carts = InMemoryCartStore::new();
        let products = InMemoryProductStore::with_products([Product::new(
            MUG,
            "Mug",
            Money::from_cents(1999),
            10,
        )]);
        let addresses = InMemoryAddressStore::new();
        let user = UserId::new(1);
        addresses
            .save(NewAddress {
                user_id: user,
                postal: PostalAddress {
                    line1: "1 Main St".to_string(),
                    line2: None,
                    city: "Springfield".to_string(),
                    state: "IL".to_string(),
                    postal_code: "62701".to_string(),
                    country: "US".to_string(),
                },
                address_type: AddressType::Both,
                is_default: true,
            })
            .await
            .unwrap();

        let coordinator = CheckoutCoordinator::new(
            carts.clone(),
            InMemoryOrderStore::new(),
            addresses,
            LockingInventoryLedger::new(products.clone()),
            InMemoryPaymentGateway::new(),
        );
        (coordinator, carts, products, user)
    }

    fn card() -> CheckoutRequest {
        CheckoutRequest::with_default_addresses(domain::PaymentMethod::card_token("tok_visa"))
    }

    #[tokio::test]
    async fn test_successful_attempt_ends_with_cart_cleared() {
        let (coordinator, carts, _, user) = coordinator().await;
        carts
            .add_line(user, CartLine::new(MUG, "Mug", 2, Money::from_cents(1999)).unwrap())
            .await
            .unwrap();

        let (result, state) = coordinator.run(user, &card()).await;

        assert!(result.is_ok());
        assert_eq!(state, CheckoutState::CartCleared);
    }

    #[tokio::test]
    async fn test_failed_attempts_end_in_failed_state() {
        let (coordinator, carts, products, user) = coordinator().await;

        let (result, state) = coordinator.run(user, &card()).await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert_eq!(state, CheckoutState::Failed);

        carts
            .add_line(user, CartLine::new(MUG, "Mug", 2, Money::from_cents(1999)).unwrap())
            .await
            .unwrap();
        coordinator.gateway.decline_with("card declined");
        let (result, state) = coordinator.run(user, &card()).await;
        assert!(matches!(result, Err(CheckoutError::PaymentFailed { .. })));
        assert_eq!(state, CheckoutState::Failed);
        assert_eq!(products.get(MUG).await.unwrap().unwrap().stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_overflowing_cart_quantity_is_rejected_before_reserving() {
        let (coordinator, carts, products, user) = coordinator().await;
        carts
            .put_cart(Cart {
                user_id: user,
                lines: vec![
                    CartLine::new(MUG, "Mug", u32::MAX, Money::from_cents(1)).unwrap(),
                    CartLine::new(MUG, "Mug", 1, Money::from_cents(1)).unwrap(),
                ],
            })
            .await;

        let (result, state) = coordinator.run(user, &card()).await;

        assert!(matches!(
            result,
            Err(CheckoutError::InvalidQuantity(DomainError::QuantityOverflow { product_id }))
                if product_id == MUG
        ));
        assert_eq!(state, CheckoutState::Failed);
        assert_eq!(products.get(MUG).await.unwrap().unwrap().stock_quantity, 10);
        assert_eq!(carts.get_cart(user).await.unwrap().lines.len(), 2);
    }

    #[test]
    fn test_order_lines_sum_duplicate_cart_lines() {
        let user = UserId::new(1);
        let cart = Cart {
            user_id: user,
            lines: vec![
                CartLine::new(ProductId::new(2), "Tea", 1, Money::from_cents(550)).unwrap(),
                CartLine::new(ProductId::new(1), "Mug", 3, Money::from_cents(1999)).unwrap(),
                CartLine::new(ProductId::new(2), "Tea", 1, Money::from_cents(550)).unwrap(),
            ],
        };
        let demand = InventoryDemand::from_lines(&cart.lines).unwrap();

        let lines = order_lines(&cart, &demand).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id, ProductId::new(1));
        assert_eq!(lines[1].quantity, 2);
        assert_eq!(lines[1].line_total, Money::from_cents(1100));
        let total = Money::checked_sum(lines.iter().map(|l| l.line_total)).unwrap();
        assert_eq!(total.to_string(), "70.97");
    }
}
