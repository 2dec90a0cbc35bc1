//! Prometheus metrics endpoint handler.
//!
//! The endpoint is unauthenticated. Metric labels never carry client or room
//! identifiers.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus-formatted metrics for scraping:
/// ```text
/// # TYPE relay_sessions_active gauge
/// relay_sessions_active 3
/// ```
#[tracing::instrument(skip_all, name = "relay.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
