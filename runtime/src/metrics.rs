//! Business metrics for checkout and inventory.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `boxoffice_checkouts_total{outcome}` - Checkout attempts by outcome (error kind or `committed`)
//! - `boxoffice_tickets_issued_total` - Tickets issued by committed checkouts
//! - `boxoffice_revenue_cents_total` - Order totals of committed checkouts
//! - `boxoffice_reservations_released_total{reason}` - Reservations released (`compensation`, `expired`)
//! - `boxoffice_token_collisions_total` - Redemption token collisions reported by storage
//! - `boxoffice_reconciliation_required_total` - Orders written whose stock could not be committed
//! - `boxoffice_notification_failures_total` - Order notifications that could not be delivered
//! - `boxoffice_reservations_lapsed_total` - Commits refused because expired stock was resold
//!
//! ## Histograms
//! - `boxoffice_checkout_duration_seconds` - Wall time of a checkout attempt
//! - `boxoffice_http_request_duration_seconds{method,status}` - HTTP request latency

use metrics::{describe_counter, describe_histogram};
use std::time::Duration;

/// Register metric descriptions. Call once at startup.
pub fn register_business_metrics() {
    describe_counter!(
        "boxoffice_checkouts_total",
        "Checkout attempts by outcome"
    );
    describe_counter!(
        "boxoffice_tickets_issued_total",
        "Tickets issued by committed checkouts"
    );
    describe_counter!(
        "boxoffice_revenue_cents_total",
        "Sum of order totals of committed checkouts, in cents"
    );
    describe_counter!(
        "boxoffice_reservations_released_total",
        "Reservations released by reason (compensation, expired)"
    );
    describe_counter!(
        "boxoffice_token_collisions_total",
        "Redemption token collisions reported by storage"
    );
    describe_counter!(
        "boxoffice_reconciliation_required_total",
        "Orders persisted whose reservations could not be committed"
    );
    describe_counter!(
        "boxoffice_notification_failures_total",
        "Order notifications that could not be delivered"
    );
    describe_counter!(
        "boxoffice_reservations_lapsed_total",
        "Commits refused because the expired reservation's stock was resold"
    );
    describe_histogram!(
        "boxoffice_checkout_duration_seconds",
        "Wall time of a checkout attempt"
    );
    describe_histogram!(
        "boxoffice_http_request_duration_seconds",
        "HTTP request latency by method and status"
    );

    tracing::info!("Business metrics registered");
}

/// Record the outcome of a checkout attempt.
pub fn record_checkout(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("boxoffice_checkouts_total", "outcome" => outcome).increment(1);
    metrics::histogram!("boxoffice_checkout_duration_seconds").record(elapsed.as_secs_f64());
}

/// Record tickets and revenue from a committed order.
pub fn record_order_committed(tickets: u64, total_cents: u64) {
    metrics::counter!("boxoffice_tickets_issued_total").increment(tickets);
    metrics::counter!("boxoffice_revenue_cents_total").increment(total_cents);
}

/// Record released reservations.
pub fn record_reservations_released(reason: &'static str, count: usize) {
    metrics::counter!("boxoffice_reservations_released_total", "reason" => reason)
        .increment(count as u64);
}

/// Record a redemption token collision.
pub fn record_token_collision() {
    metrics::counter!("boxoffice_token_collisions_total").increment(1);
}

/// Record an order that needs operator reconciliation.
pub fn record_reconciliation_required() {
    metrics::counter!("boxoffice_reconciliation_required_total").increment(1);
}

/// Record a failed order notification.
pub fn record_notification_failed() {
    metrics::counter!("boxoffice_notification_failures_total").increment(1);
}
