//! Metrics definitions for Signal Relay.
//!
//! All metrics follow Prometheus naming conventions:
//! - `relay_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `message_type`: 11 values (bounded by `MessageType`)
//! - `reason`: bounded by `RelayError::close_reason` plus `client_closed` and `shutdown`
//!
//! Room and client identifiers are never used as labels.

use crate::signaling::MessageType;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Broadcast latency buckets - in-process queue hop, expected sub-millisecond
        .set_buckets_for_metric(
            Matcher::Prefix("relay_broadcast".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set broadcast latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Room & Session Metrics (Gauges)
// ============================================================================

/// Set the number of rooms registered in the hub.
///
/// Metric: `relay_rooms_active`
pub fn set_rooms_active(count: usize) {
    // usize to f64 conversion is safe for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_rooms_active").set(count as f64);
}

/// Record a session entering the active state.
///
/// Metric: `relay_sessions_active`
pub fn session_opened() {
    gauge!("relay_sessions_active").increment(1.0);
}

/// Record a session closing.
///
/// Metrics: `relay_sessions_active`, `relay_sessions_closed_total`
/// Labels: `reason`
pub fn session_closed(reason: &'static str) {
    gauge!("relay_sessions_active").decrement(1.0);
    counter!("relay_sessions_closed_total", "reason" => reason).increment(1);
}

// ============================================================================
// Message Metrics (Counters, Histograms)
// ============================================================================

/// Record a client message accepted for relay.
///
/// Metric: `relay_messages_relayed_total`
/// Labels: `message_type`
pub fn record_message_relayed(message_type: MessageType) {
    counter!("relay_messages_relayed_total", "message_type" => message_type.as_str())
        .increment(1);
}

/// Record an inbound frame that could not be decoded.
///
/// Metric: `relay_decode_errors_total`
pub fn record_decode_error() {
    counter!("relay_decode_errors_total").increment(1);
}

/// Record a session outbound queue overflow.
///
/// Metric: `relay_queue_overflows_total`
///
/// Each overflow closes the affected session.
pub fn record_queue_overflow() {
    counter!("relay_queue_overflows_total").increment(1);
}

/// Record the time a broadcast spent between enqueue and fan-out.
///
/// Metric: `relay_broadcast_latency_seconds`
/// Labels: `message_type`
pub fn record_broadcast_latency(message_type: MessageType, duration: Duration) {
    histogram!("relay_broadcast_latency_seconds", "message_type" => message_type.as_str())
        .record(duration.as_secs_f64());
}
