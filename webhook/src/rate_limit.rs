//! Sliding-window rate limiter, one bucket per source.

use std::collections::VecDeque;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::WebhookError;

pub struct SlidingWindowRateLimiter {
    buckets: DashMap<String, VecDeque<u64>>,
}

impl Default for SlidingWindowRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindowRateLimiter {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Records one request for `source` if it fits within `max_requests`
    /// per `window_seconds`, else rejects with a `retry_after_secs` ≥ 1.
    pub fn check(&self, source: &str, max_requests: usize, window_seconds: u64, now_ms: u64) -> Result<(), WebhookError> {
        let window_ms = window_seconds * 1000;
        let cutoff = now_ms.saturating_sub(window_ms);

        let mut bucket = match self.buckets.entry(source.to_string()) {
            Entry::Occupied(e) => e.into_ref(),
            Entry::Vacant(e) => e.insert(VecDeque::new()),
        };

        while matches!(bucket.front(), Some(&t) if t <= cutoff) {
            bucket.pop_front();
        }

        if bucket.len() >= max_requests {
            let oldest = *bucket.front().expect("len >= max_requests > 0 implies non-empty");
            let retry_after_secs = (oldest.saturating_sub(cutoff)).div_ceil(1000) + 1;
            return Err(WebhookError::RateLimited { retry_after_secs: retry_after_secs.max(1) });
        }

        bucket.push_back(now_ms);
        Ok(())
    }

    pub fn usage(&self, source: &str, window_seconds: u64, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(window_seconds * 1000);
        self.buckets
            .get(source)
            .map(|b| b.iter().filter(|&&t| t > cutoff).count())
            .unwrap_or(0)
    }
}
