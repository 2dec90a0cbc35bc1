//! Pre-configured test data fixtures for relay testing.
//!
//! Provides:
//! - Session settings tuned for fast tests
//! - Unique room ids so tests never share rooms
//! - JSON builders for client-originated messages

use serde_json::{json, Value};
use signal_relay::config::SessionSettings;
use std::time::Duration;
use uuid::Uuid;

/// Session settings with production timing and a generous queue.
#[must_use]
pub fn fast_settings() -> SessionSettings {
    SessionSettings::default()
}

/// Session settings with a tiny outbound queue, for backpressure tests.
#[must_use]
pub fn small_queue_settings(capacity: usize) -> SessionSettings {
    SessionSettings::new(
        Duration::from_secs(10),
        Duration::from_secs(60),
        10_000,
        capacity,
    )
}

/// A room id no other test uses.
#[must_use]
pub fn unique_room_id() -> String {
    format!("room-{}", Uuid::new_v4())
}

/// Client `offer` message.
#[must_use]
pub fn offer(to: &str, sdp: &str) -> Value {
    json!({
        "type": "offer",
        "to": to,
        "data": { "type": "offer", "sdp": sdp },
    })
}

/// Client `answer` message.
#[must_use]
pub fn answer(to: &str, sdp: &str) -> Value {
    json!({
        "type": "answer",
        "to": to,
        "data": { "type": "answer", "sdp": sdp },
    })
}

/// Client `ice-candidate` message.
#[must_use]
pub fn ice_candidate(to: &str, candidate: &str) -> Value {
    json!({
        "type": "ice-candidate",
        "to": to,
        "data": { "candidate": candidate, "sdpMid": "0", "sdpMLineIndex": 0 },
    })
}

/// Client `chat` message.
#[must_use]
pub fn chat(text: &str) -> Value {
    json!({ "type": "chat", "data": { "text": text } })
}

/// Client `join` message.
#[must_use]
pub fn join() -> Value {
    json!({ "type": "join" })
}
