//! Checkout and payment gateway configuration loaded from environment variables.

use std::time::Duration;

use domain::TransitionPolicy;

use crate::error::GatewayError;

/// Checkout configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `CHECKOUT_CURRENCY`: ISO currency sent to the gateway (default: `"usd"`)
/// - `CHECKOUT_PAYMENT_TIMEOUT_MS`: bound on each gateway call (default: `10000`)
/// - `CHECKOUT_ORDER_NUMBER_ATTEMPTS`: order number retries (default: `10`)
/// - `CHECKOUT_STATUS_POLICY`: `strict` or `permissive` (default: `strict`)
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub currency: String,
    pub payment_timeout: Duration,
    pub max_order_number_attempts: u32,
    pub status_policy: TransitionPolicy,
}

impl CheckoutConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            currency: std::env::var("CHECKOUT_CURRENCY")
                .map(|c| c.to_ascii_lowercase())
                .unwrap_or(defaults.currency),
            payment_timeout: std::env::var("CHECKOUT_PAYMENT_TIMEOUT_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_timeout),
            max_order_number_attempts: std::env::var("CHECKOUT_ORDER_NUMBER_ATTEMPTS")
                .ok()
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_order_number_attempts),
            status_policy: std::env::var("CHECKOUT_STATUS_POLICY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.status_policy),
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            payment_timeout: Duration::from_secs(10),
            max_order_number_attempts: 10,
            status_policy: TransitionPolicy::Strict,
        }
    }
}

/// Connection settings for a Stripe-compatible payment gateway.
///
/// Reads from environment variables:
/// - `PAYMENT_GATEWAY_API_KEY`: secret key (required)
/// - `PAYMENT_GATEWAY_BASE_URL`: API root (default: `"https://api.stripe.com"`)
/// - `PAYMENT_GATEWAY_TEST_MODE`: tag charges as test payments (default: `false`)
#[derive(Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub test_mode: bool,
}

impl GatewayConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stripe.com";

    /// Creates a configuration for the public API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            test_mode: false,
        }
    }

    /// Points the client at another API root, e.g. a local mock.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Fails with `MissingApiKey` if `PAYMENT_GATEWAY_API_KEY` is unset or blank.
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = std::env::var("PAYMENT_GATEWAY_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GatewayError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("PAYMENT_GATEWAY_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        let test_mode = std::env::var("PAYMENT_GATEWAY_TEST_MODE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(config.with_test_mode(test_mode))
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("test_mode", &self.test_mode)
            .finish()
    }
}
