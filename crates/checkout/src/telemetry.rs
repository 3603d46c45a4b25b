//! Tracing subscriber and Prometheus recorder setup for hosts of the checkout.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

pub const CHECKOUT_ATTEMPTS: &str = "checkout_attempts_total";
pub const CHECKOUT_COMPLETED: &str = "checkout_completed_total";
pub const CHECKOUT_FAILED: &str = "checkout_failed_total";
pub const CHECKOUT_DURATION: &str = "checkout_duration_seconds";
pub const INVENTORY_RESERVATIONS: &str = "inventory_reservations_total";
pub const INVENTORY_RELEASED: &str = "inventory_released_total";

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`). `LOG_FORMAT=json`
/// switches to one JSON object per line.
pub fn init_tracing() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    }
}

/// Installs the global Prometheus recorder and describes checkout metrics.
///
/// The returned handle renders the exposition text for a scrape endpoint.
pub fn install_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// Registers help text for every checkout metric with the current recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(CHECKOUT_ATTEMPTS, "Checkout attempts started");
    metrics::describe_counter!(CHECKOUT_COMPLETED, "Checkouts that produced an order");
    metrics::describe_counter!(CHECKOUT_FAILED, "Failed checkouts by reason");
    metrics::describe_histogram!(
        CHECKOUT_DURATION,
        metrics::Unit::Seconds,
        "Wall time of a checkout attempt"
    );
    metrics::describe_counter!(
        INVENTORY_RESERVATIONS,
        "Inventory reservations by outcome"
    );
    metrics::describe_counter!(INVENTORY_RELEASED, "Inventory demands released");
}
