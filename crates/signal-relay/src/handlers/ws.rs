//! WebSocket upgrade endpoint.
//!
//! `GET /ws?roomId=<id>&isHost=true&debug=true`
//!
//! - `roomId`: room to join, the configured default room when absent or empty
//! - `isHost`: `"true"` requests host status after the join handshake
//! - `debug`: `"true"` appends an extra suffix to the generated client id

use crate::errors::RelayError;
use crate::ids::generate_client_id;
use crate::routes::AppState;
use crate::signaling::{ClientSession, Frame};

use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{future, SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub room_id: Option<String>,
    pub is_host: Option<String>,
    pub debug: Option<String>,
}

impl ConnectParams {
    /// Room to join, falling back to `default_room_id`.
    #[must_use]
    pub fn room_or(&self, default_room_id: &str) -> String {
        self.room_id
            .as_deref()
            .filter(|room_id| !room_id.is_empty())
            .unwrap_or(default_room_id)
            .to_string()
    }

    #[must_use]
    pub fn wants_host(&self) -> bool {
        self.is_host.as_deref() == Some("true")
    }

    #[must_use]
    pub fn debug_ids(&self) -> bool {
        self.debug.as_deref() == Some("true")
    }
}

/// Handler for GET /ws
///
/// Refuses new connections with 503 once shutdown has begun.
#[instrument(skip_all, name = "relay.ws.upgrade", fields(remote_addr = %addr))]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<ConnectParams>,
) -> Response {
    if state.hub.is_shut_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }

    let room_id = params.room_or(&state.config.default_room_id);
    let client_id = generate_client_id(params.debug_ids());
    let wants_host = params.wants_host();

    debug!(
        target: "relay.ws",
        remote_addr = %addr,
        client_id = %client_id,
        room_id = %room_id,
        wants_host,
        "Upgrading connection"
    );

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, client_id, room_id, wants_host))
}

/// Adapt the socket to frames and hand it to a new session.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    client_id: String,
    room_id: String,
    wants_host: bool,
) {
    let (sink, stream) = socket.split();

    let inbound = stream.map(|message| message.map(Frame::from).map_err(RelayError::from));
    let outbound = sink
        .sink_map_err(RelayError::from)
        .with(|frame: Frame| future::ready(Ok::<_, RelayError>(ws::Message::from(frame))));

    let session = ClientSession::connect(
        &state.hub,
        client_id,
        &room_id,
        state.config.session_settings(),
        inbound,
        outbound,
    )
    .await;

    if wants_host {
        let granted = session.room().set_host(session.id()).await;
        info!(
            target: "relay.ws",
            client_id = %session.id(),
            room_id = %room_id,
            granted,
            "Host requested on connect"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn params(query: &str) -> ConnectParams {
        let uri: axum::http::Uri = format!("http://relay/ws?{query}").parse().unwrap();
        Query::<ConnectParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_room_defaults_when_absent_or_empty() {
        assert_eq!(params("").room_or("default-room"), "default-room");
        assert_eq!(params("roomId=").room_or("default-room"), "default-room");
        assert_eq!(params("roomId=r1").room_or("default-room"), "r1");
    }

    #[test]
    fn test_flags_require_literal_true() {
        assert!(params("isHost=true").wants_host());
        assert!(!params("isHost=1").wants_host());
        assert!(!params("isHost=TRUE").wants_host());
        assert!(params("debug=true").debug_ids());
        assert!(!params("").debug_ids());
    }
}
