use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in seconds, 0 if the system clock is before the epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
