//! HTTP client for a Stripe-compatible payment intents API.

use async_trait::async_trait;
use domain::{PaymentOutcome, PaymentStatus};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

use super::payment::{ChargeRequest, PaymentGateway};

#[derive(Debug, Deserialize)]
struct PaymentIntentBody {
    id: String,
    status: String,
    #[serde(default)]
    last_payment_error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    payment_intent: Option<PaymentIntentRef>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentRef {
    id: String,
}

impl ErrorDetail {
    fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "payment declined".to_string())
    }
}

/// Payment gateway backed by the `/v1/payment_intents` endpoints.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    config: GatewayConfig,
}

impl StripeGateway {
    /// Creates a client for the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        if config.api_key.trim().is_empty() {
            return Err(GatewayError::MissingApiKey);
        }
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    /// Creates a client from `PAYMENT_GATEWAY_*` environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(GatewayConfig::from_env()?)
    }

    fn charge_form(&self, request: &ChargeRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("amount", request.amount.cents().to_string()),
            ("currency", request.currency.to_ascii_lowercase()),
            ("payment_method", request.payment_method.clone()),
            ("confirm", "true".to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("automatic_payment_methods[allow_redirects]", "never".to_string()),
        ];
        if let Some(email) = &request.customer_email {
            form.push(("receipt_email", email.clone()));
            form.push(("metadata[customer_email]", email.clone()));
        }
        if self.config.test_mode {
            form.push(("metadata[test_payment]", "true".to_string()));
        }
        form
    }

    async fn post(&self, path: &str, form: &[(&str, String)]) -> Result<PaymentOutcome, GatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.config.base_url, path))
            .bearer_auth(&self.config.api_key)
            .form(form)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body: PaymentIntentBody = response
                    .json()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
                Ok(Self::outcome(body))
            }
            StatusCode::UNAUTHORIZED => Err(GatewayError::Unauthorized),
            status => {
                let text = response.text().await.unwrap_or_default();
                match serde_json::from_str::<ErrorBody>(&text) {
                    // Card declines are answers, not transport failures.
                    Ok(body) if body.error.kind.as_deref() == Some("card_error") => {
                        let reference_id = body
                            .error
                            .payment_intent
                            .as_ref()
                            .map(|pi| pi.id.clone())
                            .unwrap_or_default();
                        Ok(PaymentOutcome::failed(reference_id, body.error.describe()))
                    }
                    Ok(body) => Err(GatewayError::Api {
                        status: status.as_u16(),
                        message: body.error.describe(),
                    }),
                    Err(_) => Err(GatewayError::Api {
                        status: status.as_u16(),
                        message: text,
                    }),
                }
            }
        }
    }

    fn outcome(body: PaymentIntentBody) -> PaymentOutcome {
        let status = PaymentStatus::from_gateway(&body.status);
        let failure_reason = if status.is_success() {
            None
        } else {
            Some(
                body.last_payment_error
                    .map(|e| e.describe())
                    .unwrap_or_else(|| format!("payment intent is {}", body.status)),
            )
        };
        PaymentOutcome {
            status,
            reference_id: body.id,
            failure_reason,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(skip(self, request), fields(amount = %request.amount, currency = %request.currency))]
    async fn charge(&self, request: ChargeRequest) -> Result<PaymentOutcome, GatewayError> {
        let form = self.charge_form(&request);
        let outcome = self.post("/v1/payment_intents", &form).await?;
        tracing::info!(reference_id = %outcome.reference_id, status = %outcome.status, "payment intent created");
        Ok(outcome)
    }

    #[tracing::instrument(skip(self))]
    async fn confirm(&self, intent_id: &str) -> Result<PaymentOutcome, GatewayError> {
        let path = format!("/v1/payment_intents/{intent_id}/confirm");
        let outcome = self.post(&path, &[]).await?;
        tracing::info!(reference_id = %outcome.reference_id, status = %outcome.status, "payment intent confirmed");
        Ok(outcome)
    }
}
