//! Room listing endpoint.

use crate::routes::AppState;

use axum::extract::State;
use axum::Json;
use std::sync::Arc;

/// Handler for GET /api/rooms
///
/// Returns the ids of all active rooms as a JSON array, sorted.
#[tracing::instrument(skip_all, name = "relay.rooms.list")]
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let mut room_ids = state.hub.list_active_room_ids().await;
    room_ids.sort();
    Json(room_ids)
}
