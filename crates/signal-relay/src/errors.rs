//! Signal Relay error types.
//!
//! Every error here is local to one session: transport failures end that
//! session, decode failures skip a single frame. Nothing in the core is fatal
//! to the process.

use thiserror::Error;

/// Signal Relay error type.
///
/// Grouped by how the session reacts:
/// - `Transport`, `ReadTimeout`, `WriteTimeout`, `MessageTooLarge`: session closes
/// - `Decode`, `UnknownMessageType`: frame skipped, session continues
/// - `QueueFull`: session closes (backpressure is treated as failure)
/// - `SessionClosed`, `Internal`: reported to the caller only
#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection read or write failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound payload could not be decoded as a message.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Inbound message carried a `type` the relay does not know.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// Inbound frame exceeded the configured size limit.
    #[error("Message too large: {size} bytes (limit {limit})")]
    MessageTooLarge { size: usize, limit: usize },

    /// No liveness response arrived before the read deadline.
    #[error("Read deadline exceeded")]
    ReadTimeout,

    /// A single write did not complete before the write deadline.
    #[error("Write deadline exceeded")]
    WriteTimeout,

    /// Outbound queue for a client is at capacity.
    #[error("Outbound queue full for client {0}")]
    QueueFull(String),

    /// Session has already been closed.
    #[error("Session closed")]
    SessionClosed,

    /// Internal error (channel teardown, task failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns true if this error ends the session that observed it.
    #[must_use]
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(
            self,
            RelayError::Decode(_) | RelayError::UnknownMessageType(_)
        )
    }

    /// Bounded label used for the `relay_sessions_closed_total` metric.
    #[must_use]
    pub fn close_reason(&self) -> &'static str {
        match self {
            RelayError::Transport(_) => "transport",
            RelayError::Decode(_) | RelayError::UnknownMessageType(_) => "decode",
            RelayError::MessageTooLarge { .. } => "message_too_large",
            RelayError::ReadTimeout => "read_timeout",
            RelayError::WriteTimeout => "write_timeout",
            RelayError::QueueFull(_) => "queue_full",
            RelayError::SessionClosed | RelayError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Decode(err.to_string())
    }
}

impl From<axum::Error> for RelayError {
    fn from(err: axum::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(RelayError::Transport("reset".to_string()).is_fatal_to_session());
        assert!(RelayError::ReadTimeout.is_fatal_to_session());
        assert!(RelayError::WriteTimeout.is_fatal_to_session());
        assert!(RelayError::QueueFull("user-1".to_string()).is_fatal_to_session());
        assert!(RelayError::MessageTooLarge {
            size: 20_000,
            limit: 10_000
        }
        .is_fatal_to_session());

        assert!(!RelayError::Decode("eof".to_string()).is_fatal_to_session());
        assert!(!RelayError::UnknownMessageType("dance".to_string()).is_fatal_to_session());
    }

    #[test]
    fn test_close_reason_labels() {
        assert_eq!(
            RelayError::Transport("x".to_string()).close_reason(),
            "transport"
        );
        assert_eq!(RelayError::ReadTimeout.close_reason(), "read_timeout");
        assert_eq!(RelayError::WriteTimeout.close_reason(), "write_timeout");
        assert_eq!(
            RelayError::QueueFull("user-1".to_string()).close_reason(),
            "queue_full"
        );
        assert_eq!(RelayError::SessionClosed.close_reason(), "internal");
    }

    #[test]
    fn test_serde_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let relay_err: RelayError = err.into();
        assert!(matches!(relay_err, RelayError::Decode(_)));
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", RelayError::UnknownMessageType("dance".to_string())),
            "Unknown message type: dance"
        );
        assert_eq!(
            format!(
                "{}",
                RelayError::MessageTooLarge {
                    size: 12_000,
                    limit: 10_000
                }
            ),
            "Message too large: 12000 bytes (limit 10000)"
        );
        assert_eq!(
            format!("{}", RelayError::QueueFull("user-9".to_string())),
            "Outbound queue full for client user-9"
        );
    }
}
