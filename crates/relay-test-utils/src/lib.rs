//! # Relay Test Utilities
//!
//! Shared test utilities for Signal Relay.
//!
//! ## Modules
//!
//! - `mock_connection` - In-memory transport attached directly to a `ClientSession`
//! - `server_harness` - `TestRelayServer`, a real relay bound to `127.0.0.1:0`
//! - `ws_client` - WebSocket client for end-to-end tests against the harness
//! - `fixtures` - Settings, room ids and client message builders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_test_utils::*;
//! use signal_relay::signaling::{Hub, MessageType};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let hub = Arc::new(Hub::new(100));
//!     let room = unique_room_id();
//!
//!     let (_a, mut alice) = MockConnection::connect(&hub, "alice", &room, fast_settings()).await;
//!     alice.expect_type(MessageType::HostStatus).await;
//!     alice.expect_type(MessageType::Welcome).await;
//!     alice.expect_type(MessageType::UserList).await;
//! }
//! ```

pub mod fixtures;
pub mod mock_connection;
pub mod server_harness;
pub mod ws_client;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_connection::MockConnection;
pub use server_harness::TestRelayServer;
pub use ws_client::WsTestClient;
