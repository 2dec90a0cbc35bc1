//! Signaling core: messages, rooms, sessions and the hub that owns them.
//!
//! ```text
//! Hub (one per process)
//! └── Room (one per room id, pruned when empty)
//!     ├── broadcast task (fans queued messages out to members)
//!     └── ClientSession (one per connection)
//!         ├── read task  (frames -> room)
//!         └── write task (outbound queue -> frames, liveness pings)
//! ```
//!
//! Lock order is always Hub -> Room -> Session.

pub mod frame;
pub mod hub;
pub mod message;
pub mod room;
pub mod session;

pub use frame::Frame;
pub use hub::Hub;
pub use message::{Message, MessageBody, MessageType};
pub use room::Room;
pub use session::ClientSession;
