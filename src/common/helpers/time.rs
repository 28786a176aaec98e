use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used to timestamp captured frames.
pub fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
