//! Signaling scenarios driven through in-memory client connections.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use relay_test_utils::{
    answer, chat, fast_settings, ice_candidate, join, offer, small_queue_settings,
    unique_room_id, MockConnection,
};
use signal_relay::signaling::{Hub, Message, MessageBody, MessageType};
use std::sync::Arc;
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(100);

async fn wait_for_room_gone(hub: &Hub, room_id: &str) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while hub.room(room_id).await.is_some() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("room should be pruned");
}

#[tokio::test]
async fn test_first_client_in_empty_room() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();

    let (session, mut alice) = MockConnection::connect(&hub, "alice", &room, fast_settings()).await;

    assert_eq!(alice.recv_message().await, Message::host_status(true));
    match alice.expect_type(MessageType::Welcome).await.body {
        MessageBody::Welcome(data) => {
            assert_eq!(data.room_id, room);
            assert_eq!(data.client_id, "alice");
            assert!(data.is_host);
        }
        other => panic!("expected welcome, got {other:?}"),
    }
    assert_eq!(
        alice.expect_type(MessageType::UserList).await,
        Message::user_list(Vec::new()).with_to("alice")
    );
    assert!(session.is_host());
    assert_eq!(hub.list_active_room_ids().await, vec![room]);
}

#[tokio::test]
async fn test_second_client_learns_host_and_is_announced() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, mut alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;

    let (bob_session, mut bob) = MockConnection::connect(&hub, "bob", &room, fast_settings()).await;

    assert_eq!(
        bob.recv_message().await,
        Message::host_change("alice", Some(false))
    );
    bob.expect_type(MessageType::Welcome).await;
    assert_eq!(
        bob.expect_type(MessageType::UserList).await,
        Message::user_list(vec!["alice".to_string()]).with_to("bob")
    );

    let announced = alice.expect_type(MessageType::UserJoined).await;
    assert_eq!(announced, Message::user_joined("bob", false));
    assert!(!bob_session.is_host());
}

#[tokio::test]
async fn test_full_offer_answer_exchange() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, mut alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;
    let (_b, mut bob) = MockConnection::join(&hub, "bob", &room, fast_settings()).await;
    alice.expect_type(MessageType::UserJoined).await;

    alice.send_json(&offer("bob", "v=0 offer"));
    let received = bob.expect_type(MessageType::Offer).await;
    assert_eq!(received.from.as_deref(), Some("alice"));
    assert_eq!(received.to.as_deref(), Some("bob"));
    match &received.body {
        MessageBody::Offer(Some(data)) => assert_eq!(data["sdp"], "v=0 offer"),
        other => panic!("expected offer payload, got {other:?}"),
    }

    bob.send_json(&answer("alice", "v=0 answer"));
    let received = alice.expect_type(MessageType::Answer).await;
    assert_eq!(received.from.as_deref(), Some("bob"));

    bob.send_json(&ice_candidate("alice", "candidate:1 1 udp 1 10.0.0.1 5000 typ host"));
    let received = alice.expect_type(MessageType::IceCandidate).await;
    assert_eq!(received.from.as_deref(), Some("bob"));

    // Signaling is never echoed to the sender.
    alice.expect_silence(QUIET).await;
    bob.expect_silence(QUIET).await;
}

#[tokio::test]
async fn test_recipient_field_is_advisory() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, mut alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;
    let (_b, mut bob) = MockConnection::join(&hub, "bob", &room, fast_settings()).await;
    let (_c, mut carol) = MockConnection::join(&hub, "carol", &room, fast_settings()).await;
    alice.expect_type(MessageType::UserJoined).await;
    alice.expect_type(MessageType::UserJoined).await;
    bob.expect_type(MessageType::UserJoined).await;

    alice.send_json(&offer("bob", "v=0"));

    assert_eq!(
        bob.expect_type(MessageType::Offer).await.to.as_deref(),
        Some("bob")
    );
    assert_eq!(
        carol.expect_type(MessageType::Offer).await.to.as_deref(),
        Some("bob")
    );
}

#[tokio::test]
async fn test_chat_reaches_everyone_including_sender() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, mut alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;
    let (_b, mut bob) = MockConnection::join(&hub, "bob", &room, fast_settings()).await;
    alice.expect_type(MessageType::UserJoined).await;

    bob.send_json(&chat("hello"));

    let to_alice = alice.expect_type(MessageType::Chat).await;
    let to_bob = bob.expect_type(MessageType::Chat).await;
    assert_eq!(to_alice, to_bob);
    assert_eq!(to_alice.from.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_join_message_reannounces_and_refreshes_list() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, mut alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;
    let (_b, mut bob) = MockConnection::join(&hub, "bob", &room, fast_settings()).await;
    alice.expect_type(MessageType::UserJoined).await;

    alice.send_json(&join());

    assert_eq!(
        alice.expect_type(MessageType::UserList).await,
        Message::user_list(vec!["bob".to_string()]).with_to("alice")
    );
    assert_eq!(
        bob.expect_type(MessageType::UserJoined).await,
        Message::join_announcement("alice", true)
    );
}

#[tokio::test]
async fn test_host_disconnect_hands_over_host() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;
    let (bob_session, mut bob) = MockConnection::join(&hub, "bob", &room, fast_settings()).await;

    alice.disconnect();

    assert_eq!(
        bob.expect_type(MessageType::UserLeft).await,
        Message::user_left("alice")
    );
    assert_eq!(
        bob.expect_type(MessageType::HostChange).await,
        Message::host_change("bob", None)
    );
    assert!(bob_session.is_host());

    let room_handle = hub.room(&room).await.expect("room should remain");
    assert_eq!(room_handle.len().await, 1);
    assert_eq!(room_handle.host_id().await.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_transport_error_closes_session() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, mut alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;
    let (bob_session, bob) = MockConnection::join(&hub, "bob", &room, fast_settings()).await;
    alice.expect_type(MessageType::UserJoined).await;

    bob.fail("connection reset");

    assert_eq!(
        alice.expect_type(MessageType::UserLeft).await,
        Message::user_left("bob")
    );
    assert!(bob_session.is_closed());
}

#[tokio::test]
async fn test_last_client_leaving_removes_room() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;
    let (_b, mut bob) = MockConnection::join(&hub, "bob", &room, fast_settings()).await;

    alice.disconnect();
    bob.expect_type(MessageType::UserLeft).await;
    assert!(hub.list_active_room_ids().await.contains(&room));

    bob.disconnect();
    bob.expect_closed().await;
    wait_for_room_gone(&hub, &room).await;
    assert!(!hub.list_active_room_ids().await.contains(&room));

    // A later join starts from a fresh room.
    let (session, _carol) = MockConnection::join(&hub, "carol", &room, fast_settings()).await;
    assert!(session.is_host());
}

#[tokio::test]
async fn test_slow_client_is_disconnected() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, mut alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;

    // Bob never drains: open the session without attaching a writer.
    let (bob, _queue) = signal_relay::signaling::ClientSession::open(
        &hub,
        "bob".to_string(),
        &room,
        small_queue_settings(4),
    )
    .await;

    for i in 0..8 {
        alice.send_json(&chat(&format!("message {i}")));
    }

    tokio::time::timeout(Duration::from_secs(2), async {
        while !bob.is_closed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("slow client should be closed");

    // Alice keeps working and eventually sees bob leave.
    loop {
        let message = alice.recv_message().await;
        if message == Message::user_left("bob") {
            break;
        }
    }
}

#[tokio::test]
async fn test_malformed_input_does_not_disturb_room() {
    let hub = Arc::new(Hub::new(100));
    let room = unique_room_id();
    let (_a, mut alice) = MockConnection::join(&hub, "alice", &room, fast_settings()).await;
    let (_b, mut bob) = MockConnection::join(&hub, "bob", &room, fast_settings()).await;
    alice.expect_type(MessageType::UserJoined).await;

    bob.send_text("{{{{");
    bob.send_text(r#"{"type":"mystery","data":{}}"#);
    bob.send_text(r#"{"type":"offer","data":"not an object"}"#);
    bob.send_json(&chat("still here"));

    let message = alice.expect_type(MessageType::Chat).await;
    assert_eq!(message.from.as_deref(), Some("bob"));
}
