//! Proxy selection policies: round-robin, random, sticky, fastest,
//! least-used and a weighted smart score. Round-robin walks the
//! candidate slice once per call and wraps around.

use rand::Rng;

use crate::types::Proxy;

/// Round-robin over `available`, starting at `*index` and wrapping once.
/// Returns the chosen slot and advances `*index` for the next call.
pub fn round_robin<'a>(available: &'a [Proxy], index: &mut usize) -> &'a Proxy {
    let n = available.len();
    if *index >= n {
        *index = 0;
    }
    let chosen = &available[*index];
    *index = (*index + 1) % n;
    chosen
}

pub fn random_pick<'a>(available: &'a [Proxy]) -> &'a Proxy {
    let idx = rand::thread_rng().gen_range(0..available.len());
    &available[idx]
}

pub fn fastest<'a>(available: &'a [Proxy]) -> &'a Proxy {
    available
        .iter()
        .min_by(|a, b| {
            let at = if a.stats.avg_response_time_ms > 0.0 {
                a.stats.avg_response_time_ms
            } else {
                f64::INFINITY
            };
            let bt = if b.stats.avg_response_time_ms > 0.0 {
                b.stats.avg_response_time_ms
            } else {
                f64::INFINITY
            };
            at.partial_cmp(&bt).unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("available is non-empty")
}

pub fn least_used<'a>(available: &'a [Proxy]) -> &'a Proxy {
    available
        .iter()
        .min_by_key(|p| p.stats.total_requests)
        .expect("available is non-empty")
}

/// Weighted score combining success rate, latency, freshness and recent
/// failures, exactly mirroring `_get_smart_proxy`'s point budget (40 / 30 /
/// 20, minus a per-failure penalty, plus a small random tiebreaker).
pub fn smart_score(proxy: &Proxy, now_ms: u64) -> f64 {
    let mut score = proxy.stats.success_rate() * 40.0;

    if proxy.stats.avg_response_time_ms > 0.0 {
        score += (30.0 - (proxy.stats.avg_response_time_ms / 166.67)).max(0.0);
    } else {
        score += 15.0;
    }

    if proxy.stats.last_used_ms > 0 {
        let seconds_since_use = now_ms.saturating_sub(proxy.stats.last_used_ms) as f64 / 1000.0;
        score += (seconds_since_use / 3.0).min(20.0);
    } else {
        score += 20.0;
    }

    score -= proxy.stats.consecutive_failures as f64 * 10.0;
    score += rand::thread_rng().gen_range(0.0..10.0);
    score
}

pub fn smart_pick<'a>(available: &'a [Proxy], now_ms: u64) -> &'a Proxy {
    available
        .iter()
        .max_by(|a, b| {
            smart_score(a, now_ms)
                .partial_cmp(&smart_score(b, now_ms))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("available is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Proxy;

    fn sample(n: usize) -> Vec<Proxy> {
        (0..n).map(|i| Proxy::new(format!("host{i}"), 8080, None)).collect()
    }

    #[test]
    fn round_robin_wraps_and_advances() {
        let proxies = sample(3);
        let mut idx = 0;
        let a = round_robin(&proxies, &mut idx).id.clone();
        let b = round_robin(&proxies, &mut idx).id.clone();
        let c = round_robin(&proxies, &mut idx).id.clone();
        let d = round_robin(&proxies, &mut idx).id.clone();
        assert_eq!(a, proxies[0].id);
        assert_eq!(b, proxies[1].id);
        assert_eq!(c, proxies[2].id);
        assert_eq!(d, proxies[0].id);
    }

    #[test]
    fn fastest_prefers_lower_latency() {
        let mut proxies = sample(2);
        proxies[0].stats.avg_response_time_ms = 500.0;
        proxies[1].stats.avg_response_time_ms = 50.0;
        assert_eq!(fastest(&proxies).id, proxies[1].id);
    }

    #[test]
    fn least_used_prefers_fewer_requests() {
        let mut proxies = sample(2);
        proxies[0].stats.total_requests = 10;
        proxies[1].stats.total_requests = 1;
        assert_eq!(least_used(&proxies).id, proxies[1].id);
    }
}
