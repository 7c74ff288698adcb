//! `ProxyPool`: concurrent proxy registry, rotation and health monitoring.
//! Maps are `dashmap` for concurrent per-key state; rotation/sticky
//! indices are `parking_lot::Mutex` since they're small, hot-path, and
//! never held across an await.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::policy;
use crate::types::{Proxy, ProxyRotationStrategy, ProxyStatus};
use common::time::now_ms;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub rotation_strategy: ProxyRotationStrategy,
    pub ban_threshold: u32,
    pub auto_remove_bad: bool,
    pub test_url: String,
    pub test_timeout: Duration,
    pub health_check_interval: Duration,
    pub test_on_start: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            rotation_strategy: ProxyRotationStrategy::Smart,
            ban_threshold: 5,
            auto_remove_bad: false,
            test_url: "https://api.ipify.org".to_string(),
            test_timeout: Duration::from_secs(10),
            health_check_interval: Duration::from_secs(300),
            test_on_start: false,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PoolStats {
    pub total: usize,
    pub good: usize,
    pub slow: usize,
    pub bad: usize,
    pub banned: usize,
    pub untested: usize,
    pub avg_response_time_ms: f64,
    pub total_requests: u64,
    pub success_rate: f64,
}

pub struct ProxyPool {
    config: PoolConfig,
    proxies: DashMap<String, Proxy>,
    groups: DashMap<String, Vec<String>>,
    banned_proxies: DashMap<String, HashSet<String>>,
    rotation_index: Mutex<HashMap<String, usize>>,
    sticky_assignments: Mutex<HashMap<String, String>>,
    health_check: AsyncMutex<Option<JoinHandle<()>>>,
}

impl ProxyPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            proxies: DashMap::new(),
            groups: DashMap::new(),
            banned_proxies: DashMap::new(),
            rotation_index: Mutex::new(HashMap::new()),
            sticky_assignments: Mutex::new(HashMap::new()),
            health_check: AsyncMutex::new(None),
        }
    }

    pub async fn start(self: &Arc<Self>) {
        if self.config.test_on_start {
            self.test_all_proxies(None).await;
        }
        let pool = Arc::clone(self);
        let handle = tokio::spawn(async move { pool.health_check_loop().await });
        *self.health_check.lock().await = Some(handle);
        info!("proxy health monitoring started");
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.health_check.lock().await.take() {
            handle.abort();
        }
        info!("proxy pool stopped");
    }

    pub fn add_proxy(&self, proxy: Proxy) -> String {
        let id = proxy.id.clone();
        if let Some(group) = &proxy.group_id {
            self.groups.entry(group.clone()).or_default().push(id.clone());
        }
        debug!(proxy = %proxy.display(), group = ?proxy.group_id, "proxy added");
        self.proxies.insert(id.clone(), proxy);
        id
    }

    pub fn add_proxies_from_string(
        &self,
        proxy_string: &str,
        group_id: &str,
    ) -> Vec<String> {
        let mut ids = Vec::new();
        for line in proxy_string.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Proxy::from_string(line, Some(group_id.to_string())) {
                Ok(proxy) => ids.push(self.add_proxy(proxy)),
                Err(err) => warn!(line, %err, "failed to parse proxy"),
            }
        }
        info!(count = ids.len(), group = group_id, "proxies added");
        ids
    }

    pub fn remove_proxy(&self, proxy_id: &str) {
        if let Some((_, proxy)) = self.proxies.remove(proxy_id) {
            if let Some(group) = &proxy.group_id {
                if let Some(mut members) = self.groups.get_mut(group) {
                    members.retain(|id| id != proxy_id);
                }
            }
            debug!(proxy_id, "proxy removed");
        }
    }

    fn candidate_ids(&self, group_id: Option<&str>) -> Vec<String> {
        match group_id {
            Some(g) => self.groups.get(g).map(|v| v.clone()).unwrap_or_default(),
            None => self.proxies.iter().map(|e| e.key().clone()).collect(),
        }
    }

    /// Selects the next proxy to use per `strategy` (falls back to the pool
    /// default), filtering out `Bad`/`Banned` proxies and any proxy banned
    /// for `site`. If filtering empties the candidate set, falls back to the
    /// unfiltered list rather than returning nothing, matching
    /// `ProxyManager.get_proxy`'s own fallback.
    pub fn get_proxy(
        &self,
        group_id: Option<&str>,
        task_id: Option<&str>,
        site: Option<&str>,
        strategy: Option<ProxyRotationStrategy>,
    ) -> Result<Proxy, ProxyError> {
        let strategy = strategy.unwrap_or(self.config.rotation_strategy);
        let ids = self.candidate_ids(group_id);
        if ids.is_empty() {
            return Err(ProxyError::NoneAvailable { group: group_id.map(str::to_string) });
        }

        let banned_here = site.and_then(|s| self.banned_proxies.get(s).map(|b| b.clone()));

        let mut available: Vec<Proxy> = ids
            .iter()
            .filter_map(|id| self.proxies.get(id).map(|p| p.clone()))
            .filter(|p| !matches!(p.status, ProxyStatus::Bad | ProxyStatus::Banned))
            .filter(|p| banned_here.as_ref().map(|b| !b.contains(&p.id)).unwrap_or(true))
            .collect();

        if available.is_empty() {
            available = ids
                .iter()
                .filter_map(|id| self.proxies.get(id).map(|p| p.clone()))
                .collect();
        }
        if available.is_empty() {
            return Err(ProxyError::NoneAvailable { group: group_id.map(str::to_string) });
        }

        let chosen = match strategy {
            ProxyRotationStrategy::Sticky if task_id.is_some() => {
                self.sticky_pick(task_id.unwrap(), &available)
            }
            ProxyRotationStrategy::Random => policy::random_pick(&available).clone(),
            ProxyRotationStrategy::RoundRobin => {
                let key = group_id.unwrap_or("default").to_string();
                let mut indices = self.rotation_index.lock();
                let idx = indices.entry(key).or_insert(0);
                policy::round_robin(&available, idx).clone()
            }
            ProxyRotationStrategy::Fastest => policy::fastest(&available).clone(),
            ProxyRotationStrategy::LeastUsed => policy::least_used(&available).clone(),
            ProxyRotationStrategy::Smart => policy::smart_pick(&available, now_ms()).clone(),
            ProxyRotationStrategy::Sticky => policy::random_pick(&available).clone(),
        };
        Ok(chosen)
    }

    fn sticky_pick(&self, task_id: &str, available: &[Proxy]) -> Proxy {
        let mut assignments = self.sticky_assignments.lock();
        if let Some(proxy_id) = assignments.get(task_id) {
            if let Some(proxy) = available.iter().find(|p| &p.id == proxy_id) {
                return proxy.clone();
            }
        }
        let chosen = policy::random_pick(available).clone();
        assignments.insert(task_id.to_string(), chosen.id.clone());
        chosen
    }

    pub fn record_success(&self, proxy_id: &str, response_time_ms: f64) {
        let Some(mut entry) = self.proxies.get_mut(proxy_id) else { return };
        let stats = &mut entry.stats;
        stats.success_count += 1;
        stats.total_requests += 1;
        stats.consecutive_failures = 0;
        stats.last_response_time_ms = response_time_ms;
        stats.last_used_ms = now_ms();
        stats.avg_response_time_ms = if stats.avg_response_time_ms == 0.0 {
            response_time_ms
        } else {
            stats.avg_response_time_ms * 0.8 + response_time_ms * 0.2
        };
        if matches!(entry.status, ProxyStatus::Untested | ProxyStatus::Slow) {
            entry.status = ProxyStatus::Good;
        }
    }

    pub fn record_failure(&self, proxy_id: &str, site: Option<&str>, is_ban: bool) {
        let auto_remove = self.config.auto_remove_bad;
        let ban_threshold = self.config.ban_threshold;
        let mut should_remove = false;
        if let Some(mut entry) = self.proxies.get_mut(proxy_id) {
            let stats = &mut entry.stats;
            stats.failure_count += 1;
            stats.total_requests += 1;
            stats.consecutive_failures += 1;
            stats.last_used_ms = now_ms();

            if is_ban {
                stats.ban_count += 1;
                if let Some(site) = site {
                    stats.sites_banned.insert(site.to_string());
                    self.banned_proxies
                        .entry(site.to_string())
                        .or_default()
                        .insert(proxy_id.to_string());
                }
                if stats.ban_count >= 3 {
                    entry.status = ProxyStatus::Banned;
                }
            } else if stats.consecutive_failures >= ban_threshold {
                entry.status = ProxyStatus::Bad;
                should_remove = auto_remove;
            }
        }
        if should_remove {
            self.remove_proxy(proxy_id);
        }
    }

    pub async fn test_proxy(&self, proxy_id: &str) -> Result<bool, ProxyError> {
        let url = { self.proxies.get(proxy_id).map(|p| p.url()) };
        let Some(url) = url else {
            return Err(ProxyError::UnknownProxy(proxy_id.to_string()));
        };

        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(&url)?)
            .timeout(self.config.test_timeout)
            .danger_accept_invalid_certs(true)
            .build()?;

        let start = std::time::Instant::now();
        let result = client.get(&self.config.test_url).send().await;
        let elapsed_ms = start.elapsed().as_millis() as f64;

        let Some(mut entry) = self.proxies.get_mut(proxy_id) else {
            return Err(ProxyError::UnknownProxy(proxy_id.to_string()));
        };

        match result {
            Ok(resp) if resp.status().is_success() => {
                entry.status = if elapsed_ms < 2000.0 { ProxyStatus::Good } else { ProxyStatus::Slow };
                entry.stats.last_tested_ms = now_ms();
                entry.stats.avg_response_time_ms = elapsed_ms;
                Ok(true)
            }
            _ => {
                entry.status = ProxyStatus::Bad;
                Ok(false)
            }
        }
    }

    /// Tests every proxy in `group_id` (or the whole pool) concurrently, in
    /// batches of 50, matching `test_all_proxies`'s chunking.
    pub async fn test_all_proxies(&self, group_id: Option<&str>) -> PoolStats {
        let ids = self.candidate_ids(group_id);
        for batch in ids.chunks(50) {
            let futures = batch.iter().map(|id| self.test_proxy(id));
            let _ = futures::future::join_all(futures).await;
        }
        let stats = self.get_stats(group_id);
        info!(good = stats.good, slow = stats.slow, bad = stats.bad, "proxy test complete");
        stats
    }

    async fn health_check_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.health_check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            interval.tick().await;
            self.test_all_proxies(None).await;
        }
    }

    pub fn get_stats(&self, group_id: Option<&str>) -> PoolStats {
        let ids = self.candidate_ids(group_id);
        let proxies: Vec<_> = ids.iter().filter_map(|id| self.proxies.get(id).map(|p| p.clone())).collect();
        let total = proxies.len();
        if total == 0 {
            return PoolStats::default();
        }
        PoolStats {
            total,
            good: proxies.iter().filter(|p| p.status == ProxyStatus::Good).count(),
            slow: proxies.iter().filter(|p| p.status == ProxyStatus::Slow).count(),
            bad: proxies.iter().filter(|p| p.status == ProxyStatus::Bad).count(),
            banned: proxies.iter().filter(|p| p.status == ProxyStatus::Banned).count(),
            untested: proxies.iter().filter(|p| p.status == ProxyStatus::Untested).count(),
            avg_response_time_ms: proxies.iter().map(|p| p.stats.avg_response_time_ms).sum::<f64>() / total as f64,
            total_requests: proxies.iter().map(|p| p.stats.total_requests).sum(),
            success_rate: proxies.iter().map(|p| p.stats.success_rate()).sum::<f64>() / total as f64,
        }
    }

    pub fn clear_bans(&self, site: Option<&str>) {
        match site {
            Some(site) => {
                self.banned_proxies.remove(site);
                for mut entry in self.proxies.iter_mut() {
                    entry.stats.sites_banned.remove(site);
                }
            }
            None => {
                self.banned_proxies.clear();
                for mut entry in self.proxies.iter_mut() {
                    entry.stats.sites_banned.clear();
                    entry.stats.ban_count = 0;
                    if entry.status == ProxyStatus::Banned {
                        entry.status = ProxyStatus::Untested;
                    }
                }
            }
        }
        info!(site = ?site, "ban records cleared");
    }

    pub fn export_proxies(&self, group_id: Option<&str>, status: Option<ProxyStatus>) -> String {
        let ids = self.candidate_ids(group_id);
        ids.iter()
            .filter_map(|id| self.proxies.get(id).map(|p| p.clone()))
            .filter(|p| status.map(|s| p.status == s).unwrap_or(true))
            .map(|p| match (&p.username, &p.password) {
                (Some(u), Some(pw)) => format!("{}:{}:{}:{}", p.host, p.port, u, pw),
                _ => format!("{}:{}", p.host, p.port),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ProxyPool {
        ProxyPool::new(PoolConfig { test_on_start: false, ..PoolConfig::default() })
    }

    #[test]
    fn add_and_get_proxy_round_robin() {
        let pool = pool();
        pool.add_proxies_from_string("1.1.1.1:80\n2.2.2.2:80\n3.3.3.3:80", "default");
        let a = pool
            .get_proxy(None, None, None, Some(ProxyRotationStrategy::RoundRobin))
            .unwrap();
        let b = pool
            .get_proxy(None, None, None, Some(ProxyRotationStrategy::RoundRobin))
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn sticky_strategy_returns_same_proxy_for_same_task() {
        let pool = pool();
        pool.add_proxies_from_string("1.1.1.1:80\n2.2.2.2:80", "default");
        let first = pool
            .get_proxy(None, Some("task-1"), None, Some(ProxyRotationStrategy::Sticky))
            .unwrap();
        let second = pool
            .get_proxy(None, Some("task-1"), None, Some(ProxyRotationStrategy::Sticky))
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn banned_for_site_is_excluded_but_available_elsewhere() {
        let pool = pool();
        let ids = pool.add_proxies_from_string("1.1.1.1:80\n2.2.2.2:80", "default");
        pool.record_failure(&ids[0], Some("nike.com"), true);
        pool.record_failure(&ids[0], Some("nike.com"), true);
        pool.record_failure(&ids[0], Some("nike.com"), true);
        let chosen = pool
            .get_proxy(None, None, Some("nike.com"), Some(ProxyRotationStrategy::RoundRobin))
            .unwrap();
        assert_eq!(chosen.id, ids[1]);
    }

    #[test]
    fn three_bans_marks_proxy_banned_globally() {
        let pool = pool();
        let ids = pool.add_proxies_from_string("1.1.1.1:80", "default");
        for _ in 0..3 {
            pool.record_failure(&ids[0], Some("nike.com"), true);
        }
        let stats = pool.get_stats(None);
        assert_eq!(stats.banned, 1);
    }

    #[test]
    fn round_robin_fairness_over_six_calls() {
        let pool = pool();
        let ids = pool.add_proxies_from_string("1.1.1.1:80\n2.2.2.2:80\n3.3.3.3:80", "default");
        let picks: Vec<usize> = (0..6)
            .map(|_| {
                let chosen = pool
                    .get_proxy(None, None, None, Some(ProxyRotationStrategy::RoundRobin))
                    .unwrap();
                ids.iter().position(|id| id == &chosen.id).unwrap()
            })
            .collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn bad_proxy_excluded_from_selection_but_not_removed() {
        let pool = ProxyPool::new(PoolConfig { ban_threshold: 2, test_on_start: false, ..PoolConfig::default() });
        let ids = pool.add_proxies_from_string("1.1.1.1:80\n2.2.2.2:80", "default");
        pool.record_failure(&ids[0], None, false);
        pool.record_failure(&ids[0], None, false);
        for _ in 0..5 {
            let chosen = pool
                .get_proxy(None, None, None, Some(ProxyRotationStrategy::RoundRobin))
                .unwrap();
            assert_eq!(chosen.id, ids[1]);
        }
        assert!(pool.proxies.contains_key(&ids[0]));
    }

    #[test]
    fn consecutive_failures_mark_bad() {
        let pool = ProxyPool::new(PoolConfig { ban_threshold: 2, test_on_start: false, ..PoolConfig::default() });
        let ids = pool.add_proxies_from_string("1.1.1.1:80", "default");
        pool.record_failure(&ids[0], None, false);
        pool.record_failure(&ids[0], None, false);
        let stats = pool.get_stats(None);
        assert_eq!(stats.bad, 1);
    }
}
