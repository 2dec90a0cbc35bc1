//! `Room` - the sessions of one call, host bookkeeping and broadcast fan-out.
//!
//! Each `Room`:
//! - Owns its membership map (client id -> session) and the current host id
//! - Runs one broadcast task that drains a bounded queue and fans messages out
//!   to member outbound queues
//!
//! # Locking
//!
//! Membership is guarded by a `tokio::sync::RwLock`. No session is ever sent
//! to while that lock is held: recipients are snapshotted, the lock released,
//! then each session's non-blocking `send` is called. Broadcasts enqueued by a
//! single caller are delivered in enqueue order.

use crate::errors::RelayError;
use crate::observability::metrics;

use super::message::Message;
use super::session::ClientSession;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// One queued broadcast.
#[derive(Debug)]
struct Broadcast {
    message: Message,
    /// Member skipped at delivery time, if any.
    exclude: Option<String>,
    enqueued_at: Instant,
}

#[derive(Default)]
struct RoomState {
    members: HashMap<String, Arc<ClientSession>>,
    /// Always names a current member when set.
    host_id: Option<String>,
}

/// A signaling room.
pub struct Room {
    id: String,
    state: Arc<RwLock<RoomState>>,
    broadcast_tx: mpsc::Sender<Broadcast>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Room {
    /// Create a room and spawn its broadcast task.
    ///
    /// The task stops when `cancel_token` is cancelled or the room is dropped.
    #[must_use]
    pub fn spawn(id: String, queue_capacity: usize, cancel_token: CancellationToken) -> Arc<Self> {
        let (broadcast_tx, broadcast_rx) = mpsc::channel(queue_capacity);
        let state = Arc::new(RwLock::new(RoomState::default()));

        tokio::spawn(run_broadcast_loop(
            id.clone(),
            Arc::clone(&state),
            broadcast_rx,
            cancel_token.clone(),
        ));

        Arc::new(Self {
            id,
            state,
            broadcast_tx,
            cancel_token,
        })
    }

    /// Room identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Register a session, electing it host if the room was empty.
    ///
    /// A session whose id is already present replaces the previous entry.
    /// The new member is told the host situation: `host-status{isHost:true}`
    /// if it was just elected, otherwise `host-change{hostId, isHost}` when a
    /// host exists.
    pub async fn add_member(&self, session: Arc<ClientSession>) {
        let client_id = session.id().to_string();

        let notice = {
            let mut state = self.state.write().await;
            state
                .members
                .insert(client_id.clone(), Arc::clone(&session));

            if state.members.len() == 1 && state.host_id.is_none() {
                state.host_id = Some(client_id.clone());
                session.set_host_flag(true);
                Some(Message::host_status(true))
            } else {
                let is_host = state.host_id.as_deref() == Some(client_id.as_str());
                session.set_host_flag(is_host);
                state
                    .host_id
                    .as_deref()
                    .map(|host_id| Message::host_change(host_id, Some(is_host)))
            }
        };

        debug!(
            target: "relay.room",
            room_id = %self.id,
            client_id = %client_id,
            is_host = session.is_host(),
            "Member added"
        );

        if let Some(notice) = notice {
            session.send(notice);
        }
    }

    /// Remove a member. No-op if `client_id` is not a member.
    ///
    /// If the host leaves and others remain, an arbitrary remaining member is
    /// promoted and `host-change{hostId}` is broadcast to the room. The host
    /// id is cleared when the room empties.
    #[instrument(skip_all, fields(room_id = %self.id, client_id = %client_id))]
    pub async fn remove_member(&self, client_id: &str) {
        let promoted = {
            let mut state = self.state.write().await;
            let Some(removed) = state.members.remove(client_id) else {
                return;
            };

            if state.members.is_empty() {
                state.host_id = None;
                None
            } else if state.host_id.as_deref() == Some(client_id) {
                removed.set_host_flag(false);
                let next = state
                    .members
                    .iter()
                    .next()
                    .map(|(id, session)| (id.clone(), Arc::clone(session)));
                match next {
                    Some((next_id, next_session)) => {
                        next_session.set_host_flag(true);
                        state.host_id = Some(next_id.clone());
                        Some(next_id)
                    }
                    None => None,
                }
            } else {
                None
            }
        };

        debug!(target: "relay.room", room_id = %self.id, client_id = %client_id, "Member removed");

        if let Some(host_id) = promoted {
            info!(
                target: "relay.room",
                room_id = %self.id,
                host_id = %host_id,
                "Host left, new host assigned"
            );
            if let Err(e) = self.broadcast(Message::host_change(&host_id, None), None).await {
                debug!(target: "relay.room", room_id = %self.id, error = %e, "Host change not broadcast");
            }
        }
    }

    /// Make `client_id` the host.
    ///
    /// Returns false, changing nothing, if `client_id` is not a member.
    /// Otherwise every member receives `host-change{hostId, isHost}` with
    /// `isHost` individualized for that member.
    pub async fn set_host(&self, client_id: &str) -> bool {
        let recipients = {
            let mut state = self.state.write().await;
            let Some(new_host) = state.members.get(client_id).cloned() else {
                return false;
            };

            if let Some(previous) = state.host_id.take() {
                if let Some(previous) = state.members.get(&previous) {
                    previous.set_host_flag(false);
                }
            }
            new_host.set_host_flag(true);
            state.host_id = Some(client_id.to_string());

            state.members.values().cloned().collect::<Vec<_>>()
        };

        info!(target: "relay.room", room_id = %self.id, host_id = %client_id, "Host set");

        for member in recipients {
            let is_host = member.id() == client_id;
            member.send(Message::host_change(client_id, Some(is_host)));
        }
        true
    }

    /// Queue `message` for every member except `exclude`.
    ///
    /// Waits while the broadcast queue is full. Membership is read when the
    /// message is delivered, not when it is queued.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Internal` if the room's broadcast task has stopped.
    pub async fn broadcast(&self, message: Message, exclude: Option<&str>) -> Result<(), RelayError> {
        if self.cancel_token.is_cancelled() {
            return Err(RelayError::Internal(format!("room {} is closed", self.id)));
        }
        self.broadcast_tx
            .send(Broadcast {
                message,
                exclude: exclude.map(str::to_string),
                enqueued_at: Instant::now(),
            })
            .await
            .map_err(|_| RelayError::Internal(format!("broadcast task for room {} stopped", self.id)))
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.members.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.members.len()
    }

    /// Snapshot of the current members.
    pub async fn members(&self) -> Vec<Arc<ClientSession>> {
        self.state.read().await.members.values().cloned().collect()
    }

    /// Snapshot of the current member ids.
    pub async fn member_ids(&self) -> Vec<String> {
        self.state.read().await.members.keys().cloned().collect()
    }

    pub async fn host_id(&self) -> Option<String> {
        self.state.read().await.host_id.clone()
    }

    /// Stop the broadcast task. Queued broadcasts are discarded.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

#[instrument(skip_all, name = "relay.room.broadcast", fields(room_id = %room_id))]
async fn run_broadcast_loop(
    room_id: String,
    state: Arc<RwLock<RoomState>>,
    mut receiver: mpsc::Receiver<Broadcast>,
    cancel_token: CancellationToken,
) {
    debug!(target: "relay.room", room_id = %room_id, "Broadcast task started");

    let mut delivered: u64 = 0;
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            item = receiver.recv() => match item {
                Some(item) => {
                    deliver(&state, item).await;
                    delivered += 1;
                }
                None => break,
            }
        }
    }

    debug!(
        target: "relay.room",
        room_id = %room_id,
        delivered,
        "Broadcast task stopped"
    );
}

async fn deliver(state: &RwLock<RoomState>, item: Broadcast) {
    let recipients: Vec<Arc<ClientSession>> = {
        let state = state.read().await;
        state
            .members
            .iter()
            .filter(|(id, _)| item.exclude.as_deref() != Some(id.as_str()))
            .map(|(_, session)| Arc::clone(session))
            .collect()
    };

    metrics::record_broadcast_latency(item.message.message_type(), item.enqueued_at.elapsed());

    for recipient in recipients {
        recipient.send(item.message.clone());
    }
}
