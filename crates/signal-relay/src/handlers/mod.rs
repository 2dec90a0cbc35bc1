//! HTTP request handlers for Signal Relay.

pub mod metrics;
pub mod rooms;
pub mod ws;

pub use metrics::metrics_handler;
pub use rooms::list_rooms;
pub use ws::{ws_handler, ConnectParams};
