//! Prometheus metrics for facturation-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Invoice counter by type (invoice, credit_note).
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturation_invoices_total",
        "Total number of invoices created by type",
        &["invoice_type"]
    )
    .expect("Failed to register invoices_total")
});

pub static QUOTES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturation_quotes_total",
        "Total number of quotes created by origin",
        &["origin"] // new, duplicate, invoice
    )
    .expect("Failed to register quotes_total")
});

/// Payment counter by method.
pub static PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturation_payments_total",
        "Total number of payments recorded by method",
        &["method"]
    )
    .expect("Failed to register payments_total")
});

/// Invoice state transitions (finalized, overdue, reconciled).
pub static TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturation_transitions_total",
        "Total number of invoice state transitions",
        &["transition"]
    )
    .expect("Failed to register transitions_total")
});

/// Number allocation retries after a unique-index conflict.
pub static NUMBERING_RETRIES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturation_numbering_retries_total",
        "Total number of document number allocation retries",
        &["kind"]
    )
    .expect("Failed to register numbering_retries_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturation_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "facturation_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&QUOTES_TOTAL);
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&TRANSITIONS_TOTAL);
    Lazy::force(&NUMBERING_RETRIES);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
