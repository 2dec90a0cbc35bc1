//! Client identifier generation.
//!
//! Identifiers are unique within the process: a timestamp prefix keeps them
//! roughly sortable in logs, a random suffix makes collisions impossible in
//! practice even for connections accepted in the same microsecond.

use chrono::Utc;
use uuid::Uuid;

/// Prefix for every generated client identifier.
pub const CLIENT_ID_PREFIX: &str = "user-";

/// Generate a new client identifier.
///
/// `disambiguate` appends an extra numeric suffix, used by clients testing
/// several tabs on one machine so their ids are visibly distinct.
#[must_use]
pub fn generate_client_id(disambiguate: bool) -> String {
    let now = Utc::now();
    let uuid = Uuid::new_v4().simple().to_string();
    let short = uuid.get(..8).unwrap_or("00000000");
    let base = format!("{CLIENT_ID_PREFIX}{}-{short}", now.format("%Y%m%d%H%M%S%6f"));

    if disambiguate {
        let nanos = now.timestamp_subsec_nanos() % 1000;
        format!("{base}-{nanos}")
    } else {
        base
    }
}
