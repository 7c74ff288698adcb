//! `Monitor`: one polling loop over one product surface. An Arc-wrapped
//! service holds `tokio::sync::Mutex`-guarded shared state and fans
//! observations out to subscribers over `mpsc`, driving a
//! `SiteMonitor::check` poll loop through the tick algorithm's state
//! machine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use common::ring::RingBuffer;
use common::time::now_ms;

use crate::keyword::KeywordMatcher;
use crate::site::SiteMonitor;
use crate::types::{EventType, MatchResult, MonitorResult, MonitorState, Priority, ProductEvent, ProductObservation};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub site_name: String,
    pub site_url: String,
    pub keywords: String,
    pub delay: Duration,
    pub error_delay: Duration,
}

struct Seen {
    fingerprint: String,
    observation: ProductObservation,
}

pub struct Monitor<S: SiteMonitor> {
    config: MonitorConfig,
    matcher: KeywordMatcher,
    site: Arc<S>,
    state: Mutex<MonitorState>,
    seen: Mutex<HashMap<String, Seen>>,
    subscribers: Mutex<Vec<mpsc::Sender<ProductEvent>>>,
    events: Mutex<RingBuffer<ProductEvent>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: SiteMonitor + 'static> Monitor<S> {
    pub fn new(config: MonitorConfig, site: Arc<S>) -> Arc<Self> {
        let matcher = KeywordMatcher::parse(&config.keywords);
        Arc::new(Self {
            config,
            matcher,
            site,
            state: Mutex::new(MonitorState::Idle),
            seen: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            events: Mutex::new(RingBuffer::new(500)),
            loop_handle: Mutex::new(None),
        })
    }

    pub async fn state(&self) -> MonitorState {
        *self.state.lock().await
    }

    pub async fn subscribe(&self) -> mpsc::Receiver<ProductEvent> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().await.push(tx);
        rx
    }

    pub async fn recent_events(&self) -> Vec<ProductEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    pub async fn start(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().await;
            if *state != MonitorState::Idle && *state != MonitorState::Stopped {
                return;
            }
            *state = MonitorState::Starting;
        }
        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move { monitor.run_loop().await });
        *self.loop_handle.lock().await = Some(handle);
    }

    pub async fn stop(&self) {
        *self.state.lock().await = MonitorState::Stopped;
        if let Some(handle) = self.loop_handle.lock().await.take() {
            handle.abort();
        }
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            if *self.state.lock().await == MonitorState::Stopped {
                return;
            }

            let sleep_for = self.tick().await;
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Runs one tick and returns how long to sleep before the next one.
    pub async fn tick(&self) -> Duration {
        match self.site.check().await {
            MonitorResult::RateLimited => {
                self.transition_rate_limited().await;
                self.config.error_delay * 2
            }
            MonitorResult::Error(err) => {
                warn!(site = %self.config.site_name, %err, "monitor tick failed");
                self.transition_error().await;
                self.config.error_delay
            }
            MonitorResult::Products(products) => {
                self.transition_running().await;
                for observation in products {
                    self.process_observation(observation).await;
                }
                self.config.delay
            }
        }
    }

    async fn transition_rate_limited(&self) {
        let mut state = self.state.lock().await;
        *state = MonitorState::RateLimited;
    }

    async fn transition_error(&self) {
        let mut state = self.state.lock().await;
        if *state != MonitorState::Stopped {
            *state = MonitorState::Error;
        }
    }

    async fn transition_running(&self) {
        let mut state = self.state.lock().await;
        if *state != MonitorState::Stopped {
            *state = MonitorState::Running;
        }
    }

    async fn process_observation(&self, observation: ProductObservation) {
        let fingerprint = observation.fingerprint();
        let previous = {
            let seen = self.seen.lock().await;
            seen.get(&observation.url).map(|s| (s.fingerprint.clone(), s.observation.clone()))
        };

        if let Some((prev_fp, _)) = &previous {
            if prev_fp == &fingerprint {
                return;
            }
        }

        let (matched, confidence) = self.matcher.evaluate(
            &observation.title,
            "",
            observation.sku.as_deref(),
        );

        self.seen.lock().await.insert(
            observation.url.clone(),
            Seen { fingerprint, observation: observation.clone() },
        );

        if !matched {
            return;
        }

        let event_type = match &previous {
            None => {
                if !observation.available || observation.available_sizes.is_empty() {
                    return;
                }
                EventType::NewProduct
            }
            Some((_, prev)) => {
                if (prev.available_sizes.is_empty() || !prev.available) && !observation.available_sizes.is_empty() {
                    EventType::Restock
                } else if sizes_disjoint_and_nonempty(&prev.available_sizes, &observation.available_sizes) {
                    EventType::SizeChange
                } else if prev.price != observation.price {
                    EventType::PriceChange
                } else {
                    EventType::Restock
                }
            }
        };

        let priority = if confidence >= 0.9 { Priority::High } else if confidence >= 0.5 { Priority::Medium } else { Priority::Low };

        let event = ProductEvent {
            event_type,
            source: self.config.site_url.clone(),
            store_name: self.config.site_name.clone(),
            observation,
            match_result: MatchResult { matched, confidence },
            priority,
            timestamp_ms: now_ms(),
        };

        self.events.lock().await.push(event.clone());

        let subscribers = self.subscribers.lock().await;
        for sender in subscribers.iter() {
            if sender.send(event.clone()).await.is_err() {
                error!("monitor subscriber channel closed");
            }
        }
    }
}

fn sizes_disjoint_and_nonempty(previous: &[String], current: &[String]) -> bool {
    if previous.is_empty() || current.is_empty() {
        return false;
    }
    current.iter().all(|s| !previous.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MonitorResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSite {
        tick: AtomicUsize,
        ticks: Vec<Vec<ProductObservation>>,
    }

    #[async_trait::async_trait]
    impl SiteMonitor for ScriptedSite {
        async fn check(&self) -> MonitorResult {
            let n = self.tick.fetch_add(1, Ordering::SeqCst);
            MonitorResult::Products(self.ticks.get(n).cloned().unwrap_or_default())
        }
    }

    fn observation(sizes: Vec<&str>) -> ProductObservation {
        ProductObservation {
            url: "https://example.com/p".into(),
            title: "Air Jordan 1".into(),
            sku: None,
            price: Some(180.0),
            image_url: None,
            available: !sizes.is_empty(),
            available_sizes: sizes.into_iter().map(String::from).collect(),
            variant_ids: vec![],
            observed_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn restock_emits_exactly_one_event_at_second_tick() {
        let site = Arc::new(ScriptedSite {
            tick: AtomicUsize::new(0),
            ticks: vec![vec![observation(vec![])], vec![observation(vec!["10", "10.5"])]],
        });
        let monitor = Monitor::new(
            MonitorConfig {
                site_name: "Example".into(),
                site_url: "https://example.com".into(),
                keywords: "".into(),
                delay: Duration::from_millis(1),
                error_delay: Duration::from_millis(1),
            },
            site,
        );

        monitor.tick().await;
        assert!(monitor.recent_events().await.is_empty());

        monitor.tick().await;
        let events = monitor.recent_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Restock);
        assert_eq!(events[0].observation.available_sizes, vec!["10", "10.5"]);
    }

    #[tokio::test]
    async fn first_seen_unavailable_product_emits_no_event() {
        let site = Arc::new(ScriptedSite {
            tick: AtomicUsize::new(0),
            ticks: vec![vec![observation(vec![])]],
        });
        let monitor = Monitor::new(
            MonitorConfig {
                site_name: "Example".into(),
                site_url: "https://example.com".into(),
                keywords: "".into(),
                delay: Duration::from_millis(1),
                error_delay: Duration::from_millis(1),
            },
            site,
        );

        monitor.tick().await;
        assert!(monitor.recent_events().await.is_empty());
    }

    #[tokio::test]
    async fn first_seen_available_product_emits_new_product() {
        let site = Arc::new(ScriptedSite {
            tick: AtomicUsize::new(0),
            ticks: vec![vec![observation(vec!["9"])]],
        });
        let monitor = Monitor::new(
            MonitorConfig {
                site_name: "Example".into(),
                site_url: "https://example.com".into(),
                keywords: "".into(),
                delay: Duration::from_millis(1),
                error_delay: Duration::from_millis(1),
            },
            site,
        );

        monitor.tick().await;
        let events = monitor.recent_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::NewProduct);
    }
}
