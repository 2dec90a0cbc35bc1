//! In-memory client connection.
//!
//! `MockConnection` plays the browser side of a session: frames it sends are
//! read by the session's read task, frames the session's write task produces
//! land in its receive buffer. No socket is involved.
//!
//! # Example
//!
//! ```rust,ignore
//! let (session, mut conn) = MockConnection::connect(&hub, "alice", "r1", fast_settings()).await;
//! conn.send_json(&chat("hello"));
//! let echoed = conn.expect_type(MessageType::Chat).await;
//! ```

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use signal_relay::config::SessionSettings;
use signal_relay::errors::RelayError;
use signal_relay::signaling::{ClientSession, Frame, Hub, Message, MessageType};
use std::sync::Arc;
use std::time::Duration;

/// How long receive helpers wait before failing the test.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Client end of an in-memory session transport.
#[derive(Debug)]
pub struct MockConnection {
    to_relay: mpsc::UnboundedSender<Result<Frame, RelayError>>,
    from_relay: mpsc::UnboundedReceiver<Frame>,
}

impl MockConnection {
    /// Open a session in `room_id` over an in-memory transport.
    pub async fn connect(
        hub: &Arc<Hub>,
        client_id: &str,
        room_id: &str,
        settings: SessionSettings,
    ) -> (Arc<ClientSession>, Self) {
        let (to_relay, inbound) = mpsc::unbounded();
        let (outbound, from_relay) = mpsc::unbounded();
        let outbound = outbound.sink_map_err(|e| RelayError::Transport(e.to_string()));

        let session = ClientSession::connect(
            hub,
            client_id.to_string(),
            room_id,
            settings,
            inbound,
            outbound,
        )
        .await;

        (
            session,
            Self {
                to_relay,
                from_relay,
            },
        )
    }

    /// Open a session and consume its join handshake
    /// (host notice, `welcome`, `user-list`).
    pub async fn join(
        hub: &Arc<Hub>,
        client_id: &str,
        room_id: &str,
        settings: SessionSettings,
    ) -> (Arc<ClientSession>, Self) {
        let (session, mut conn) = Self::connect(hub, client_id, room_id, settings).await;
        let notice = conn.recv_message().await;
        assert!(
            matches!(
                notice.message_type(),
                MessageType::HostStatus | MessageType::HostChange
            ),
            "expected host notice, got {notice:?}"
        );
        conn.expect_type(MessageType::Welcome).await;
        conn.expect_type(MessageType::UserList).await;
        (session, conn)
    }

    /// Send a JSON value as a text frame.
    pub fn send_json(&self, value: &Value) {
        self.send_text(value.to_string());
    }

    /// Send raw text.
    pub fn send_text(&self, text: impl Into<String>) {
        self.send_frame(Frame::Text(text.into()));
    }

    /// Send any frame.
    pub fn send_frame(&self, frame: Frame) {
        self.to_relay
            .unbounded_send(Ok(frame))
            .expect("session read task is gone");
    }

    /// Answer a liveness probe.
    pub fn send_pong(&self) {
        self.send_frame(Frame::Pong(Vec::new()));
    }

    /// Inject a transport error into the session's read task.
    pub fn fail(&self, reason: &str) {
        self.to_relay
            .unbounded_send(Err(RelayError::Transport(reason.to_string())))
            .expect("session read task is gone");
    }

    /// Close the connection from the client side.
    pub fn disconnect(&self) {
        self.send_frame(Frame::Close);
    }

    /// Next frame from the relay, including pings. `None` once the relay
    /// has dropped its end.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        tokio::time::timeout(RECV_TIMEOUT, self.from_relay.next())
            .await
            .expect("timed out waiting for frame from relay")
    }

    /// Next decoded message, skipping liveness pings.
    pub async fn recv_message(&mut self) -> Message {
        loop {
            match self.recv_frame().await {
                Some(Frame::Ping(_)) => continue,
                Some(Frame::Text(text)) => {
                    return Message::decode(&text).expect("relay sent an undecodable message")
                }
                other => panic!("expected text frame, got {other:?}"),
            }
        }
    }

    /// Next message, asserting its type.
    pub async fn expect_type(&mut self, kind: MessageType) -> Message {
        let message = self.recv_message().await;
        assert_eq!(
            message.message_type(),
            kind,
            "unexpected message: {message:?}"
        );
        message
    }

    /// Assert nothing but pings arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.from_relay.next()).await {
                Err(_) => return,
                Ok(Some(Frame::Ping(_))) => continue,
                Ok(other) => panic!("expected silence, got {other:?}"),
            }
        }
    }

    /// Wait for the relay's close frame, skipping anything queued before it.
    pub async fn expect_closed(&mut self) {
        loop {
            match self.recv_frame().await {
                Some(Frame::Close) | None => return,
                Some(_) => continue,
            }
        }
    }
}
