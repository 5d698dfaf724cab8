//! Utility functions for the live tracking service

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Generate a new unique message ID
pub fn generate_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Convert unix milliseconds into a UTC timestamp, clamping invalid values to the epoch
pub fn timestamp_from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

/// Whether `last` happened less than `window` before `now`
pub fn within_window(last: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    match chrono::Duration::from_std(window) {
        Ok(window) => now.signed_duration_since(last) < window,
        Err(_) => true,
    }
}

/// Whole minutes elapsed between `start` and `now`, never negative
pub fn elapsed_minutes(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(start).num_minutes().max(0)
}
