//! Observability for Signal Relay.
//!
//! # Privacy by Default
//!
//! Spans use `#[instrument(skip_all)]` and record only client and room
//! identifiers. Message payloads (SDP, ICE candidates, chat text) are never
//! logged or used as metric labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `relay_rooms_active` | Gauge | none | Rooms registered in the hub |
//! | `relay_sessions_active` | Gauge | none | Open client sessions |
//! | `relay_messages_relayed_total` | Counter | `message_type` | Client messages accepted for relay |
//! | `relay_decode_errors_total` | Counter | none | Frames skipped as undecodable |
//! | `relay_sessions_closed_total` | Counter | `reason` | Session terminations |
//! | `relay_queue_overflows_total` | Counter | none | Sessions closed by backpressure |
//! | `relay_broadcast_latency_seconds` | Histogram | `message_type` | Broadcast queue dwell time |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
