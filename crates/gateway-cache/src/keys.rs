//! Key layout for values the gateway caches.

/// Key holding the age of the oldest stored log
pub const OLDEST_LOG_AGE: &str = "oldest_log_age";

/// Key holding the list of known log fields
pub const FIELDS: &str = "fields";

/// Key for a single event looked up by id
#[must_use]
pub fn event(id: &str) -> String {
    format!("event:{id}")
}
