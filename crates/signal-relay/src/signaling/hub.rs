//! `Hub` - process-wide registry of rooms.
//!
//! The hub is the top of the signaling hierarchy:
//!
//! - One per process, shared as `Arc<Hub>`
//! - Creates rooms on first reference and prunes them once empty
//! - Owns the root `CancellationToken`; every room runs on a child token
//!
//! # Join/Prune Atomicity
//!
//! Joining a room and pruning an empty one both run under the registry write
//! lock, so a session can never be registered into a room that is concurrently
//! being removed from the registry.
//!
//! # Graceful Shutdown
//!
//! On shutdown the hub:
//! 1. Marks itself shutting down, so new connections are refused and late
//!    joiners close themselves
//! 2. Closes every open session (each announces `user-left` and unregisters)
//! 3. Cancels the root token, stopping any remaining broadcast tasks

use crate::observability::metrics;

use super::room::Room;
use super::session::ClientSession;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Registry of live rooms.
#[derive(Debug)]
pub struct Hub {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    room_queue_capacity: usize,
    shutting_down: AtomicBool,
    cancel_token: CancellationToken,
}

impl Hub {
    /// Create an empty hub.
    ///
    /// `room_queue_capacity` bounds each room's broadcast queue.
    #[must_use]
    pub fn new(room_queue_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            room_queue_capacity,
            shutting_down: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Return the room for `room_id`, creating it if needed.
    ///
    /// Concurrent callers for the same id always observe the same room.
    pub async fn get_or_create_room(&self, room_id: &str) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;
        self.get_or_create_locked(&mut rooms, room_id)
    }

    /// Create the session built by `factory` and register it in `room_id`.
    ///
    /// The room is resolved (or created) and the session added while the
    /// registry lock is held.
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn join<F>(&self, room_id: &str, factory: F) -> Arc<ClientSession>
    where
        F: FnOnce(Arc<Room>) -> Arc<ClientSession>,
    {
        let mut rooms = self.rooms.write().await;
        let room = self.get_or_create_locked(&mut rooms, room_id);
        let session = factory(Arc::clone(&room));
        room.add_member(Arc::clone(&session)).await;
        session
    }

    /// Remove `room_id` if it has no members.
    ///
    /// No-op if the room is absent or still occupied. A later
    /// `get_or_create_room` for the same id yields a fresh room.
    pub async fn remove_room_if_empty(&self, room_id: &str) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get(room_id) else {
            return;
        };
        if !room.is_empty().await {
            return;
        }

        if let Some(room) = rooms.remove(room_id) {
            room.cancel();
        }
        metrics::set_rooms_active(rooms.len());

        info!(
            target: "relay.hub",
            room_id = %room_id,
            rooms = rooms.len(),
            "Empty room removed"
        );
    }

    /// Look up a room without creating it.
    pub async fn room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Snapshot of registered room ids, in no particular order.
    pub async fn list_active_room_ids(&self) -> Vec<String> {
        self.rooms.read().await.keys().cloned().collect()
    }

    /// Close every session and stop every room.
    #[instrument(skip_all)]
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let rooms: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();

        let mut closed = 0usize;
        for room in rooms {
            for session in room.members().await {
                session.close("shutdown").await;
                closed += 1;
            }
        }

        self.cancel_token.cancel();

        info!(
            target: "relay.hub",
            sessions_closed = closed,
            "Hub shut down"
        );
    }

    /// True from the moment `shutdown` starts.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn get_or_create_locked(
        &self,
        rooms: &mut HashMap<String, Arc<Room>>,
        room_id: &str,
    ) -> Arc<Room> {
        if let Some(room) = rooms.get(room_id) {
            return Arc::clone(room);
        }

        let room = Room::spawn(
            room_id.to_string(),
            self.room_queue_capacity,
            self.cancel_token.child_token(),
        );
        rooms.insert(room_id.to_string(), Arc::clone(&room));
        metrics::set_rooms_active(rooms.len());

        debug!(
            target: "relay.hub",
            room_id = %room_id,
            rooms = rooms.len(),
            "Room created"
        );
        room
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_or_create_returns_same_room() {
        let hub = Hub::new(16);

        let first = hub.get_or_create_room("r1").await;
        let second = hub.get_or_create_room("r1").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.id(), "r1");
        assert_eq!(hub.list_active_room_ids().await, vec!["r1".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_yields_one_room() {
        let hub = Arc::new(Hub::new(16));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let hub = Arc::clone(&hub);
            handles.push(tokio::spawn(
                async move { hub.get_or_create_room("shared").await },
            ));
        }

        let mut rooms = Vec::new();
        for handle in handles {
            rooms.push(handle.await.unwrap());
        }

        let first = rooms.first().unwrap();
        assert!(rooms.iter().all(|room| Arc::ptr_eq(first, room)));
        assert_eq!(hub.list_active_room_ids().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_empty_room_yields_fresh_room() {
        let hub = Hub::new(16);
        let original = hub.get_or_create_room("r1").await;

        hub.remove_room_if_empty("r1").await;

        assert!(hub.room("r1").await.is_none());
        assert!(original.is_cancelled());

        let fresh = hub.get_or_create_room("r1").await;
        assert!(!Arc::ptr_eq(&original, &fresh));
        assert_eq!(fresh.host_id().await, None);
    }

    #[tokio::test]
    async fn test_remove_occupied_or_absent_room_is_noop() {
        let hub = Arc::new(Hub::new(16));
        let (_session, _rx) =
            ClientSession::open(&hub, "a".to_string(), "r1", SessionSettings::default()).await;

        hub.remove_room_if_empty("r1").await;
        hub.remove_room_if_empty("missing").await;

        assert!(hub.room("r1").await.is_some());
        assert_eq!(hub.list_active_room_ids().await, vec!["r1".to_string()]);
    }

    #[tokio::test]
    async fn test_list_active_room_ids() {
        let hub = Hub::new(16);
        hub.get_or_create_room("a").await;
        hub.get_or_create_room("b").await;
        hub.get_or_create_room("c").await;

        let mut ids = hub.list_active_room_ids().await;
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_last_member_leaving_prunes_room() {
        let hub = Arc::new(Hub::new(16));
        let (a, _a_rx) =
            ClientSession::open(&hub, "a".to_string(), "r1", SessionSettings::default()).await;
        let (b, _b_rx) =
            ClientSession::open(&hub, "b".to_string(), "r1", SessionSettings::default()).await;

        a.close("client_closed").await;
        assert!(hub.list_active_room_ids().await.contains(&"r1".to_string()));

        b.close("client_closed").await;
        assert!(!hub.list_active_room_ids().await.contains(&"r1".to_string()));
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions_and_rooms() {
        let hub = Arc::new(Hub::new(16));
        let (a, _a_rx) =
            ClientSession::open(&hub, "a".to_string(), "r1", SessionSettings::default()).await;
        let (b, _b_rx) =
            ClientSession::open(&hub, "b".to_string(), "r2", SessionSettings::default()).await;
        let r1 = hub.room("r1").await.unwrap();

        hub.shutdown().await;

        assert!(hub.is_shut_down());
        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(r1.is_cancelled());
        assert!(hub.list_active_room_ids().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_join_and_close_keep_members_registered() {
        const WORKERS: usize = 8;
        const ROUNDS: usize = 201;

        let hub = Arc::new(Hub::new(64));
        // Room for every user-left and host-change a session can observe.
        let settings = SessionSettings::new(
            Duration::from_secs(10),
            Duration::from_secs(60),
            10_000,
            10_000,
        );

        let mut workers = Vec::new();
        for worker in 0..WORKERS {
            let hub = Arc::clone(&hub);
            workers.push(tokio::spawn(async move {
                let mut live = Vec::new();
                for round in 0..ROUNDS {
                    let opened =
                        ClientSession::open(&hub, format!("w{worker}-{round}"), "race", settings)
                            .await;
                    live.push(opened);
                    // Odd rounds empty this worker's share of the room.
                    if round % 2 == 1 {
                        for (session, _queue) in live.drain(..) {
                            session.close("client_closed").await;
                        }
                    }
                }
                live
            }));
        }

        let mut live = Vec::new();
        for worker in workers {
            live.extend(worker.await.unwrap());
        }
        assert_eq!(live.len(), WORKERS);

        let room = hub.room("race").await.expect("room with live members");
        for (session, _queue) in &live {
            assert!(!session.is_closed(), "{} was closed", session.id());
            assert!(
                Arc::ptr_eq(session.room(), &room),
                "{} joined a pruned room",
                session.id()
            );
        }
        assert_eq!(room.len().await, live.len());
    }
}
