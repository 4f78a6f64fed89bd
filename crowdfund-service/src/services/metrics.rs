//! Prometheus metrics for crowdfund-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Donation submissions handed to a gateway.
pub static DONATIONS_INITIATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "crowdfund_donations_initiated_total",
        "Donations dispatched to a payment gateway",
        &["gateway"]
    )
    .expect("Failed to register donations_initiated")
});

/// Callback reconciliations by outcome.
pub static DONATIONS_RECONCILED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "crowdfund_donations_reconciled_total",
        "Callback reconciliations by outcome",
        &["gateway", "outcome"] // approved, replayed, cancelled, failed, error
    )
    .expect("Failed to register donations_reconciled")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "crowdfund_errors_total",
        "Total number of errors by type",
        &["error_type"] // db_error, gateway_error, malformed_callback, ...
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "crowdfund_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DONATIONS_INITIATED);
    Lazy::force(&DONATIONS_RECONCILED);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default()
}
