//! Retry backoff: `retry_delay_ms/1000 · 2^(n−1) + uniform(0, 0.3·backoff)`,
//! capped at 30s.

use std::time::Duration;

use rand::Rng;

const MAX_BACKOFF_SECS: f64 = 30.0;

/// `n` is the 1-indexed retry number about to be attempted.
pub fn compute_backoff(retry_delay_ms: u64, n: u32) -> Duration {
    let base = (retry_delay_ms as f64 / 1000.0) * 2f64.powi(n as i32 - 1);
    let base = base.min(MAX_BACKOFF_SECS);
    let jitter = rand::thread_rng().gen_range(0.0..=(0.3 * base).max(f64::EPSILON));
    let total = (base + jitter).min(MAX_BACKOFF_SECS);
    Duration::from_secs_f64(total.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_with_each_retry_before_the_cap() {
        let first = compute_backoff(1000, 1).as_secs_f64();
        let second = compute_backoff(1000, 2).as_secs_f64();
        assert!(first >= 1.0 && first <= 1.3);
        assert!(second >= 2.0 && second <= 2.6);
    }

    #[test]
    fn never_exceeds_thirty_seconds() {
        let backoff = compute_backoff(1_000_000, 10).as_secs_f64();
        assert!(backoff <= 30.0);
    }
}
