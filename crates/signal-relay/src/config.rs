//! Signal Relay configuration.
//!
//! Configuration is loaded from environment variables. Every field has a
//! default, so an empty environment yields a working relay.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default directory served as static assets.
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Room joined when the upgrade request carries no `roomId`.
pub const DEFAULT_ROOM_ID: &str = "default-room";

/// Time allowed to write one frame to a client.
pub const DEFAULT_WRITE_WAIT_SECONDS: u64 = 10;

/// Time allowed between liveness responses from a client.
pub const DEFAULT_PONG_WAIT_SECONDS: u64 = 60;

/// Maximum inbound frame size in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10_000;

/// Capacity of each session's outbound queue.
pub const DEFAULT_SESSION_QUEUE_CAPACITY: usize = 100;

/// Capacity of each room's broadcast queue.
pub const DEFAULT_ROOM_QUEUE_CAPACITY: usize = 100;

/// Signal Relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Directory of static assets served as the router fallback.
    pub static_dir: String,

    /// Room used when a client does not name one.
    pub default_room_id: String,

    /// Per-write deadline in seconds.
    pub write_wait_seconds: u64,

    /// Read deadline in seconds, extended on every pong.
    pub pong_wait_seconds: u64,

    /// Maximum inbound frame size in bytes.
    pub max_message_size: usize,

    /// Outbound queue capacity per session.
    pub session_queue_capacity: usize,

    /// Broadcast queue capacity per room.
    pub room_queue_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Timing and sizing knobs each client session runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Deadline for a single write.
    pub write_wait: Duration,
    /// Read deadline, extended on every pong.
    pub pong_wait: Duration,
    /// Interval between liveness pings (9/10 of `pong_wait`).
    pub ping_period: Duration,
    /// Maximum inbound frame size in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity.
    pub queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_WRITE_WAIT_SECONDS),
            Duration::from_secs(DEFAULT_PONG_WAIT_SECONDS),
            DEFAULT_MAX_MESSAGE_SIZE,
            DEFAULT_SESSION_QUEUE_CAPACITY,
        )
    }
}

impl SessionSettings {
    /// Build settings, deriving the ping period from the pong wait.
    #[must_use]
    pub fn new(
        write_wait: Duration,
        pong_wait: Duration,
        max_message_size: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            write_wait,
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            max_message_size,
            queue_capacity,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("RELAY_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let static_dir = vars
            .get("RELAY_STATIC_DIR")
            .cloned()
            .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string());

        let default_room_id = vars
            .get("RELAY_DEFAULT_ROOM_ID")
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_ROOM_ID.to_string());

        let write_wait_seconds =
            parse_positive(vars, "RELAY_WRITE_WAIT_SECONDS", DEFAULT_WRITE_WAIT_SECONDS)?;
        let pong_wait_seconds =
            parse_positive(vars, "RELAY_PONG_WAIT_SECONDS", DEFAULT_PONG_WAIT_SECONDS)?;
        let max_message_size =
            parse_positive(vars, "RELAY_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE)?;
        let session_queue_capacity = parse_positive(
            vars,
            "RELAY_SESSION_QUEUE_CAPACITY",
            DEFAULT_SESSION_QUEUE_CAPACITY,
        )?;
        let room_queue_capacity =
            parse_positive(vars, "RELAY_ROOM_QUEUE_CAPACITY", DEFAULT_ROOM_QUEUE_CAPACITY)?;

        Ok(Config {
            bind_address,
            static_dir,
            default_room_id,
            write_wait_seconds,
            pong_wait_seconds,
            max_message_size,
            session_queue_capacity,
            room_queue_capacity,
        })
    }

    /// Session settings derived from this configuration.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings::new(
            Duration::from_secs(self.write_wait_seconds),
            Duration::from_secs(self.pong_wait_seconds),
            self.max_message_size,
            self.session_queue_capacity,
        )
    }
}

/// Parse an optional numeric variable, rejecting garbage and zero.
fn parse_positive<T>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value != T::default() => Ok(value),
            _ => Err(ConfigError::InvalidValue(format!(
                "{key} must be a positive integer, got '{raw}'"
            ))),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = HashMap::new();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.static_dir, DEFAULT_STATIC_DIR);
        assert_eq!(config.default_room_id, "default-room");
        assert_eq!(config.write_wait_seconds, 10);
        assert_eq!(config.pong_wait_seconds, 60);
        assert_eq!(config.max_message_size, 10_000);
        assert_eq!(config.session_queue_capacity, 100);
        assert_eq!(config.room_queue_capacity, 100);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            (
                "RELAY_BIND_ADDRESS".to_string(),
                "127.0.0.1:9090".to_string(),
            ),
            ("RELAY_STATIC_DIR".to_string(), "/srv/www".to_string()),
            ("RELAY_DEFAULT_ROOM_ID".to_string(), "lobby".to_string()),
            ("RELAY_WRITE_WAIT_SECONDS".to_string(), "5".to_string()),
            ("RELAY_PONG_WAIT_SECONDS".to_string(), "30".to_string()),
            ("RELAY_MAX_MESSAGE_SIZE".to_string(), "65536".to_string()),
            ("RELAY_SESSION_QUEUE_CAPACITY".to_string(), "16".to_string()),
            ("RELAY_ROOM_QUEUE_CAPACITY".to_string(), "32".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9090");
        assert_eq!(config.static_dir, "/srv/www");
        assert_eq!(config.default_room_id, "lobby");
        assert_eq!(config.write_wait_seconds, 5);
        assert_eq!(config.pong_wait_seconds, 30);
        assert_eq!(config.max_message_size, 65_536);
        assert_eq!(config.session_queue_capacity, 16);
        assert_eq!(config.room_queue_capacity, 32);
    }

    #[test]
    fn test_empty_default_room_falls_back() {
        let vars = HashMap::from([("RELAY_DEFAULT_ROOM_ID".to_string(), String::new())]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.default_room_id, DEFAULT_ROOM_ID);
    }

    #[test]
    fn test_invalid_numeric_value_rejected() {
        let vars = HashMap::from([(
            "RELAY_PONG_WAIT_SECONDS".to_string(),
            "sixty".to_string(),
        )]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("RELAY_PONG_WAIT_SECONDS"))
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let vars = HashMap::from([(
            "RELAY_SESSION_QUEUE_CAPACITY".to_string(),
            "0".to_string(),
        )]);

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_session_settings_derive_ping_period() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");
        let settings = config.session_settings();

        assert_eq!(settings.write_wait, Duration::from_secs(10));
        assert_eq!(settings.pong_wait, Duration::from_secs(60));
        assert_eq!(settings.ping_period, Duration::from_secs(54));
        assert_eq!(settings.max_message_size, 10_000);
        assert_eq!(settings.queue_capacity, 100);
        assert_eq!(settings, SessionSettings::default());
    }
}
