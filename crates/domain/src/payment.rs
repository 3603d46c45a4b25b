//! Payment method selection and gateway outcomes.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The single payment method a checkout uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// A tokenized card to charge immediately.
    CardToken { token: String },
    /// A payment intent created earlier by the client, to be confirmed.
    PaymentIntent { intent_id: String },
    /// Any other gateway method reference (saved payment method, wallet, ...).
    Other { method_type: String, reference: String },
}

impl PaymentMethod {
    pub fn card_token(token: impl Into<String>) -> Self {
        PaymentMethod::CardToken {
            token: token.into(),
        }
    }

    pub fn payment_intent(intent_id: impl Into<String>) -> Self {
        PaymentMethod::PaymentIntent {
            intent_id: intent_id.into(),
        }
    }

    /// Label recorded on the order.
    pub fn label(&self) -> &str {
        match self {
            PaymentMethod::CardToken { .. } => "CARD",
            PaymentMethod::PaymentIntent { .. } => "PAYMENT_INTENT",
            PaymentMethod::Other { method_type, .. } => method_type,
        }
    }

    /// Rejects methods whose reference is blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        let reference = match self {
            PaymentMethod::CardToken { token } => token,
            PaymentMethod::PaymentIntent { intent_id } => intent_id,
            PaymentMethod::Other { reference, .. } => reference,
        };
        if reference.trim().is_empty() {
            return Err(DomainError::InvalidPaymentMethod(format!(
                "{} reference is blank",
                self.label()
            )));
        }
        Ok(())
    }
}

/// Field-per-method payment payload as received from form or JSON callers.
///
/// Convert with `PaymentMethod::try_from`, which requires exactly one
/// non-blank method reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodFields {
    pub payment_method: Option<String>,
    pub card_token: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_method_id: Option<String>,
}

impl TryFrom<PaymentMethodFields> for PaymentMethod {
    type Error = DomainError;

    fn try_from(fields: PaymentMethodFields) -> Result<Self, Self::Error> {
        fn present(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        let card_token = present(fields.card_token);
        let intent_id = present(fields.payment_intent_id);
        let method_id = present(fields.payment_method_id);

        match (card_token, intent_id, method_id) {
            (Some(token), None, None) => Ok(PaymentMethod::CardToken { token }),
            (None, Some(intent_id), None) => Ok(PaymentMethod::PaymentIntent { intent_id }),
            (None, None, Some(reference)) => Ok(PaymentMethod::Other {
                method_type: present(fields.payment_method)
                    .unwrap_or_else(|| "PAYMENT_METHOD".into()),
                reference,
            }),
            (None, None, None) => Err(DomainError::InvalidPaymentMethod(
                "no payment method provided".to_string(),
            )),
            _ => Err(DomainError::InvalidPaymentMethod(
                "more than one payment method provided".to_string(),
            )),
        }
    }
}

/// Status reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Funds captured.
    Succeeded,
    /// Authorized; capture happens later.
    RequiresCapture,
    /// Still in flight or waiting on the customer.
    Pending,
    /// Declined or errored.
    Failed,
    /// Cancelled before completion.
    Canceled,
}

impl PaymentStatus {
    /// Maps a gateway status string onto the closed set.
    ///
    /// Intermediate states (`processing`, `requires_action`, ...) map to
    /// `Pending`; anything unrecognised is treated as `Failed`.
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "succeeded" => PaymentStatus::Succeeded,
            "requires_capture" => PaymentStatus::RequiresCapture,
            "processing"
            | "requires_action"
            | "requires_confirmation"
            | "requires_payment_method" => PaymentStatus::Pending,
            "canceled" => PaymentStatus::Canceled,
            _ => PaymentStatus::Failed,
        }
    }

    /// Returns true if the checkout may proceed to create the order.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::RequiresCapture
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::RequiresCapture => "requires_capture",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a charge or confirm call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub status: PaymentStatus,
    /// Gateway reference id correlating the charge to the order.
    pub reference_id: String,
    /// Decline message, when the gateway supplied one.
    pub failure_reason: Option<String>,
}

impl PaymentOutcome {
    pub fn succeeded(reference_id: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Succeeded,
            reference_id: reference_id.into(),
            failure_reason: None,
        }
    }

    pub fn failed(reference_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Failed,
            reference_id: reference_id.into(),
            failure_reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
