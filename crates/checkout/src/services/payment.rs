//! Payment gateway trait and in-memory implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::{Money, PaymentOutcome, PaymentStatus};

use crate::error::GatewayError;

/// A charge against a card token or saved payment method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    /// Amount in minor units.
    pub amount: Money,
    /// Lowercase ISO currency code.
    pub currency: String,
    /// Card token or payment method reference.
    pub payment_method: String,
    /// Receipt address, if the customer supplied one.
    pub customer_email: Option<String>,
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates and confirms a charge in one call.
    async fn charge(&self, request: ChargeRequest) -> Result<PaymentOutcome, GatewayError>;

    /// Confirms a payment intent created earlier by the client.
    async fn confirm(&self, intent_id: &str) -> Result<PaymentOutcome, GatewayError>;
}

#[derive(Debug)]
struct InMemoryGatewayState {
    charges: Vec<ChargeRequest>,
    confirmations: Vec<String>,
    next_id: u32,
    status: PaymentStatus,
    failure_reason: Option<String>,
    unavailable: bool,
    delay: Option<Duration>,
}

impl Default for InMemoryGatewayState {
    fn default() -> Self {
        Self {
            charges: Vec::new(),
            confirmations: Vec::new(),
            next_id: 0,
            status: PaymentStatus::Succeeded,
            failure_reason: None,
            unavailable: false,
            delay: None,
        }
    }
}

/// In-memory payment gateway for testing.
///
/// Every call succeeds unless told otherwise. Calls are recorded so tests can
/// assert on what was charged.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes subsequent calls report `status`, with an optional decline reason.
    pub fn set_outcome(&self, status: PaymentStatus, failure_reason: Option<&str>) {
        let mut state = self.state();
        state.status = status;
        state.failure_reason = failure_reason.map(String::from);
    }

    /// Makes subsequent calls decline with the given reason.
    pub fn decline_with(&self, reason: &str) {
        self.set_outcome(PaymentStatus::Failed, Some(reason));
    }

    /// Makes subsequent calls fail with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Delays every answer, for exercising caller timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    /// Returns the charges received so far.
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.state().charges.clone()
    }

    /// Returns the payment intents confirmed so far.
    pub fn confirmations(&self) -> Vec<String> {
        self.state().confirmations.clone()
    }

    /// Total number of gateway calls.
    pub fn call_count(&self) -> usize {
        let state = self.state();
        state.charges.len() + state.confirmations.len()
    }

    fn respond(&self, reference_id: Option<&str>) -> Result<PaymentOutcome, GatewayError> {
        let mut state = self.state();
        if state.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }

        let reference_id = match reference_id {
            Some(id) => id.to_string(),
            None => {
                state.next_id += 1;
                format!("pi_test_{:04}", state.next_id)
            }
        };
        Ok(PaymentOutcome {
            status: state.status,
            reference_id,
            failure_reason: state.failure_reason.clone(),
        })
    }

    async fn pause(&self) {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<PaymentOutcome, GatewayError> {
        self.state().charges.push(request);
        self.pause().await;
        self.respond(None)
    }

    async fn confirm(&self, intent_id: &str) -> Result<PaymentOutcome, GatewayError> {
        self.state().confirmations.push(intent_id.to_string());
        self.pause().await;
        self.respond(Some(intent_id))
    }
}
