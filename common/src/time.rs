use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic-enough wall clock in milliseconds: eligibility windows,
/// cooldowns, TTL eviction all key off this.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

pub fn now_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs_f64()
}
