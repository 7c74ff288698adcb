//! In-memory idempotency key store with lazy TTL eviction.

use dashmap::DashMap;

use crate::error::WebhookError;

pub struct IdempotencyStore {
    seen: DashMap<String, u64>,
    ttl_ms: u64,
}

impl IdempotencyStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self { seen: DashMap::new(), ttl_ms: ttl_secs * 1000 }
    }

    /// Returns `Ok(())` if `key` is new, `Err(Duplicate)` if already seen
    /// within the TTL window. Expired entries are swept on every call.
    pub fn check_and_mark(&self, key: &str, now_ms: u64) -> Result<(), WebhookError> {
        self.evict_expired(now_ms);

        if self.seen.contains_key(key) {
            return Err(WebhookError::Duplicate);
        }
        self.seen.insert(key.to_string(), now_ms);
        Ok(())
    }

    fn evict_expired(&self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.ttl_ms);
        self.seen.retain(|_, &mut ts| ts > cutoff);
    }

    pub fn size(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_submission_with_same_key_is_rejected() {
        let store = IdempotencyStore::new(3600);
        assert!(store.check_and_mark("i1", 0).is_ok());
        assert_eq!(store.check_and_mark("i1", 1000).unwrap_err(), WebhookError::Duplicate);
    }

    #[test]
    fn key_is_usable_again_after_ttl_expires() {
        let store = IdempotencyStore::new(10);
        assert!(store.check_and_mark("i1", 0).is_ok());
        assert!(store.check_and_mark("i1", 11_000).is_ok());
    }
}
