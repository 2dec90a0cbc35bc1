//! Signal Relay Service Library
//!
//! An in-memory signaling relay that brokers connection setup between
//! browser peers. The relay never carries media: it forwards session
//! descriptions, ICE candidates and chat between the members of a room, and
//! keeps track of which member is the room's host.
//!
//! # Architecture
//!
//! ```text
//! axum (/ws upgrade)
//! └── Hub (room registry)
//!     └── Room (membership, host, broadcast task)
//!         └── ClientSession (read task, write task, outbound queue)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Best effort**: no persistence, no delivery guarantees beyond in-process queues
//! - **Fail fast on slow clients**: a full outbound queue closes the session
//! - **Atomic join/prune**: joins and empty-room pruning share the registry lock
//! - **No authentication**: any client may join any room
//!
//! # Modules
//!
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types
//! - [`signaling`] - Hub, rooms, sessions and the wire message codec
//! - [`routes`] / [`handlers`] - HTTP surface
//! - [`observability`] - Health probes and metrics

pub mod config;
pub mod errors;
pub mod handlers;
pub mod ids;
pub mod observability;
pub mod routes;
pub mod signaling;
