//! `ClientSession` - one client connection bound to one room.
//!
//! Each session:
//! - Belongs to exactly one room for its whole lifetime
//! - Owns a bounded outbound queue drained by a dedicated write task
//! - Runs a read task that decodes inbound frames and routes them to the room
//!
//! # Lifecycle
//!
//! `Connecting -> Active -> Closed`. The close sequence runs exactly once no
//! matter how many paths trigger it (peer close, read error, write error,
//! queue overflow, shutdown):
//!
//! 1. Mark closed, drop the outbound sender, cancel the read task
//! 2. Broadcast `user-left{userId}` to the room
//! 3. Remove self from the room
//! 4. Ask the hub to prune the room if it is now empty
//!
//! # Backpressure
//!
//! `send` never waits. A full outbound queue means the client is not keeping
//! up, and the session is closed.
//!
//! # Transport
//!
//! The read and write tasks work on [`Frame`] streams and sinks, so any
//! connection type can be adapted to a session.

use crate::config::SessionSettings;
use crate::errors::RelayError;
use crate::observability::metrics;

use super::frame::Frame;
use super::hub::Hub;
use super::message::{Message, MessageType};
use super::room::Room;

use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Close reason recorded when the peer ends the connection normally.
const CLIENT_CLOSED: &str = "client_closed";

/// Mutable per-session state.
#[derive(Debug)]
struct SessionState {
    is_host: bool,
    closed: bool,
    /// Present until the session closes.
    outbound: Option<mpsc::Sender<Message>>,
}

/// A client connected to a room.
pub struct ClientSession {
    id: String,
    room_id: String,
    hub: Arc<Hub>,
    room: Arc<Room>,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("room_id", &self.room_id)
            .field("is_host", &state.is_host)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

impl ClientSession {
    /// Register a session in `room_id` without attaching a transport.
    ///
    /// Returns the session and the receiving end of its outbound queue. Host
    /// election happens here, so the queue may already hold a host notice.
    pub async fn open(
        hub: &Arc<Hub>,
        id: String,
        room_id: &str,
        settings: SessionSettings,
    ) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(settings.queue_capacity);

        let session = hub
            .join(room_id, |room| {
                Arc::new(Self {
                    id,
                    room_id: room_id.to_string(),
                    hub: Arc::clone(hub),
                    room,
                    settings,
                    state: Mutex::new(SessionState {
                        is_host: false,
                        closed: false,
                        outbound: Some(outbound_tx),
                    }),
                    cancel_token: CancellationToken::new(),
                })
            })
            .await;

        metrics::session_opened();
        (session, outbound_rx)
    }

    /// Register a session, start its read and write tasks over the given
    /// transport, then greet the client and announce it to the room.
    ///
    /// The client receives `welcome` and `user-list`; the other members
    /// receive `user-joined`.
    #[instrument(skip_all, name = "relay.session.connect", fields(client_id = %id, room_id = %room_id))]
    pub async fn connect<R, W>(
        hub: &Arc<Hub>,
        id: String,
        room_id: &str,
        settings: SessionSettings,
        inbound: R,
        outbound: W,
    ) -> Arc<Self>
    where
        R: Stream<Item = Result<Frame, RelayError>> + Send + 'static,
        W: Sink<Frame, Error = RelayError> + Send + 'static,
    {
        let (session, queue) = Self::open(hub, id, room_id, settings).await;

        tokio::spawn(Arc::clone(&session).read_loop(inbound));
        tokio::spawn(Arc::clone(&session).write_loop(queue, outbound));

        // Joined after shutdown took its snapshot of the rooms.
        if hub.is_shut_down() {
            session.close("shutdown").await;
            return session;
        }

        session.announce().await;

        info!(
            target: "relay.session",
            client_id = %session.id,
            room_id = %session.room_id,
            is_host = session.is_host(),
            "Client connected"
        );
        session
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.state.lock().is_host
    }

    /// Set the host flag. Host election is owned by the room.
    pub fn set_host_flag(&self, is_host: bool) {
        self.state.lock().is_host = is_host;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Queue a message for this client without waiting.
    ///
    /// Returns true if the message was queued. Messages to a closed session
    /// are dropped silently. A full queue closes the session.
    pub fn send(self: &Arc<Self>, message: Message) -> bool {
        let kind = message.message_type();
        match self.enqueue(message) {
            Ok(()) => true,
            Err(RelayError::SessionClosed) => false,
            Err(e) => {
                metrics::record_queue_overflow();
                warn!(
                    target: "relay.session",
                    client_id = %self.id,
                    room_id = %self.room_id,
                    message_type = %kind,
                    capacity = self.settings.queue_capacity,
                    error = %e,
                    "Outbound queue full, closing session"
                );
                if self.mark_closed() {
                    let session = Arc::clone(self);
                    let reason = e.close_reason();
                    tokio::spawn(async move { session.finish_close(reason).await });
                }
                false
            }
        }
    }

    /// Non-blocking enqueue onto the outbound queue.
    ///
    /// Fails with `SessionClosed` once the queue has been released and with
    /// `QueueFull` when the client is not draining.
    fn enqueue(&self, message: Message) -> Result<(), RelayError> {
        let state = self.state.lock();
        let outbound = state.outbound.as_ref().ok_or(RelayError::SessionClosed)?;
        outbound.try_send(message).map_err(|e| match e {
            TrySendError::Closed(_) => RelayError::SessionClosed,
            TrySendError::Full(_) => RelayError::QueueFull(self.id.clone()),
        })
    }

    /// Close the session. Only the first call has any effect.
    pub async fn close(self: &Arc<Self>, reason: &'static str) {
        if self.mark_closed() {
            Arc::clone(self).finish_close(reason).await;
        }
    }

    /// Flip the closed flag, release the outbound queue and stop the read
    /// task. Returns true for the caller that performed the transition.
    fn mark_closed(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            state.outbound = None;
        }
        self.cancel_token.cancel();
        true
    }

    async fn finish_close(self: Arc<Self>, reason: &'static str) {
        if let Err(e) = self
            .room
            .broadcast(Message::user_left(&self.id), None)
            .await
        {
            debug!(target: "relay.session", client_id = %self.id, error = %e, "user-left not broadcast");
        }
        self.room.remove_member(&self.id).await;
        self.hub.remove_room_if_empty(&self.room_id).await;

        metrics::session_closed(reason);
        info!(
            target: "relay.session",
            client_id = %self.id,
            room_id = %self.room_id,
            reason,
            "Client disconnected"
        );
    }

    /// Greet the client and announce it to the other members.
    async fn announce(self: &Arc<Self>) {
        self.send(Message::welcome(&self.room_id, &self.id, self.is_host()));
        self.send_user_list().await;

        let joined = Message::user_joined(&self.id, self.is_host());
        if let Err(e) = self.room.broadcast(joined, Some(self.id.as_str())).await {
            debug!(target: "relay.session", client_id = %self.id, error = %e, "user-joined not broadcast");
        }
    }

    /// Send the ids of every other member directly to this client.
    async fn send_user_list(self: &Arc<Self>) {
        let users = self
            .room
            .member_ids()
            .await
            .into_iter()
            .filter(|id| *id != self.id)
            .collect();
        self.send(Message::user_list(users).with_to(self.id.as_str()));
    }

    #[instrument(skip_all, name = "relay.session.read", fields(client_id = %self.id, room_id = %self.room_id))]
    async fn read_loop<R>(self: Arc<Self>, inbound: R)
    where
        R: Stream<Item = Result<Frame, RelayError>>,
    {
        let mut inbound = std::pin::pin!(inbound);
        let mut deadline = Instant::now() + self.settings.pong_wait;

        let result: Result<(), RelayError> = loop {
            let next = tokio::select! {
                () = self.cancel_token.cancelled() => break Ok(()),
                next = tokio::time::timeout_at(deadline, inbound.next()) => next,
            };

            let outcome = match next {
                Err(_elapsed) => Err(RelayError::ReadTimeout),
                Ok(None) | Ok(Some(Ok(Frame::Close))) => break Ok(()),
                Ok(Some(Err(e))) => Err(e),
                Ok(Some(Ok(Frame::Pong(_)))) => {
                    deadline = Instant::now() + self.settings.pong_wait;
                    Ok(())
                }
                Ok(Some(Ok(Frame::Ping(_)))) => Ok(()),
                Ok(Some(Ok(Frame::Text(text)))) => self.handle_text(&text).await,
                Ok(Some(Ok(Frame::Binary(data)))) => self.check_size(data.len()).map(|()| {
                    debug!(
                        target: "relay.session",
                        client_id = %self.id,
                        bytes = data.len(),
                        "Ignoring binary frame"
                    );
                }),
            };

            if let Err(e) = outcome {
                if e.is_fatal_to_session() {
                    break Err(e);
                }
                self.skip_frame(&e);
            }
        };

        let reason = match &result {
            Ok(()) => CLIENT_CLOSED,
            Err(e) => {
                debug!(target: "relay.session", client_id = %self.id, error = %e, "Read loop ended");
                e.close_reason()
            }
        };
        self.close(reason).await;
    }

    async fn handle_text(self: &Arc<Self>, text: &str) -> Result<(), RelayError> {
        self.check_size(text.len())?;
        let message = Message::decode(text)?;
        self.dispatch(message).await;
        Ok(())
    }

    fn check_size(&self, size: usize) -> Result<(), RelayError> {
        let limit = self.settings.max_message_size;
        if size > limit {
            return Err(RelayError::MessageTooLarge { size, limit });
        }
        Ok(())
    }

    /// Log and count a frame the session survives.
    fn skip_frame(&self, error: &RelayError) {
        metrics::record_decode_error();
        match error {
            RelayError::UnknownMessageType(kind) => warn!(
                target: "relay.session",
                client_id = %self.id,
                message_type = %kind,
                "Unrecognized message type"
            ),
            _ => warn!(
                target: "relay.session",
                client_id = %self.id,
                error = %error,
                "Skipping malformed frame"
            ),
        }
    }

    /// Route one decoded client message.
    async fn dispatch(self: &Arc<Self>, message: Message) {
        let kind = message.message_type();
        let outcome = match kind {
            MessageType::Offer | MessageType::Answer | MessageType::IceCandidate => {
                self.room
                    .broadcast(message.with_from(self.id.as_str()), Some(self.id.as_str()))
                    .await
            }
            MessageType::Chat => {
                self.room
                    .broadcast(message.with_from(self.id.as_str()), None)
                    .await
            }
            MessageType::Join => {
                let joined = Message::join_announcement(&self.id, self.is_host());
                let outcome = self.room.broadcast(joined, Some(self.id.as_str())).await;
                self.send_user_list().await;
                outcome
            }
            MessageType::Welcome
            | MessageType::UserList
            | MessageType::UserJoined
            | MessageType::UserLeft
            | MessageType::HostStatus
            | MessageType::HostChange => {
                warn!(
                    target: "relay.session",
                    client_id = %self.id,
                    message_type = %kind,
                    "Unrecognized message type"
                );
                return;
            }
        };

        match outcome {
            Ok(()) => metrics::record_message_relayed(kind),
            Err(e) => debug!(
                target: "relay.session",
                client_id = %self.id,
                message_type = %kind,
                error = %e,
                "Message not relayed"
            ),
        }
    }

    #[instrument(skip_all, name = "relay.session.write", fields(client_id = %self.id, room_id = %self.room_id))]
    async fn write_loop<W>(self: Arc<Self>, mut queue: mpsc::Receiver<Message>, outbound: W)
    where
        W: Sink<Frame, Error = RelayError>,
    {
        let mut outbound = std::pin::pin!(outbound);
        let period = self.settings.ping_period;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

        let result: Result<(), RelayError> = loop {
            tokio::select! {
                message = queue.recv() => match message {
                    Some(message) => {
                        let text = match message.encode() {
                            Ok(text) => text,
                            Err(e) => {
                                error!(target: "relay.session", client_id = %self.id, error = %e, "Failed to encode message");
                                continue;
                            }
                        };
                        if let Err(e) = self.write_frame(&mut outbound, Frame::Text(text)).await {
                            break Err(e);
                        }
                    }
                    None => {
                        // Queue released by close: say goodbye and stop.
                        let _ = self.write_frame(&mut outbound, Frame::Close).await;
                        break Ok(());
                    }
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.write_frame(&mut outbound, Frame::Ping(Vec::new())).await {
                        break Err(e);
                    }
                }
            }
        };

        let reason = match &result {
            Ok(()) => CLIENT_CLOSED,
            Err(e) => {
                debug!(target: "relay.session", client_id = %self.id, error = %e, "Write loop ended");
                e.close_reason()
            }
        };
        self.close(reason).await;
    }

    async fn write_frame<W>(&self, sink: &mut Pin<&mut W>, frame: Frame) -> Result<(), RelayError>
    where
        W: Sink<Frame, Error = RelayError> + ?Sized,
    {
        match tokio::time::timeout(self.settings.write_wait, sink.send(frame)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(RelayError::WriteTimeout),
        }
    }
}
