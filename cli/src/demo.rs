//! Scripted storefront and checkout handler so `solecop run` has
//! something to drive the monitor → scheduler → checkout pipeline against
//! without reaching out to a real site.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use monitor::{MonitorResult, ProductEvent, ProductObservation, SiteMonitor};
use scheduler::CheckoutHandler;
use task::{SiteType, Task, TaskConfig, TaskResult};

pub struct ScriptedSite {
    tick: AtomicUsize,
    ticks: Vec<Vec<ProductObservation>>,
}

impl ScriptedSite {
    /// First tick: the product is tracked but sold out. Every tick after
    /// that: a restock with one available size, so the monitor's event
    /// classifier fires `Restock` starting on the second tick.
    pub fn restock_after_first_tick() -> Self {
        let sold_out = ProductObservation {
            url: "https://demo.example.com/products/air-jordan-1".to_string(),
            title: "Air Jordan 1 Retro High OG".to_string(),
            sku: Some("DZ5485-612".to_string()),
            price: Some(180.0),
            image_url: None,
            available: false,
            available_sizes: vec![],
            variant_ids: vec![],
            observed_at_ms: 0,
        };
        let mut restocked = sold_out.clone();
        restocked.available = true;
        restocked.available_sizes = vec!["10".to_string(), "10.5".to_string()];
        restocked.variant_ids =
            vec![("41234567890".to_string(), "10".to_string()), ("41234567891".to_string(), "10.5".to_string())];

        Self { tick: AtomicUsize::new(0), ticks: vec![vec![sold_out], vec![restocked]] }
    }
}

#[async_trait]
impl SiteMonitor for ScriptedSite {
    async fn check(&self) -> MonitorResult {
        let n = self.tick.fetch_add(1, Ordering::SeqCst);
        let observations = self.ticks.get(n).or_else(|| self.ticks.last()).cloned().unwrap_or_default();
        MonitorResult::Products(observations)
    }
}

pub fn task_config_for_event(event: &ProductEvent) -> TaskConfig {
    TaskConfig {
        site_type: SiteType::Shopify,
        site_name: event.store_name.clone(),
        site_url: event.observation.url.clone(),
        monitor_input: event.observation.title.clone(),
        sizes: event.observation.available_sizes.clone(),
        mode: "auto".to_string(),
        profile_id: "demo-profile".to_string(),
        proxy_group_id: None,
        monitor_delay_ms: 3000,
        retry_delay_ms: 2000,
        max_retries: 2,
        retry_on_decline: false,
        retry_on_error: true,
    }
}

/// Stands in for a real `checkout::CheckoutEngine::run_attempt` call —
/// succeeds immediately so the CLI demo can show the full pipeline without
/// a storefront on the other end.
pub struct DemoCheckoutHandler;

#[async_trait]
impl CheckoutHandler for DemoCheckoutHandler {
    async fn attempt(&self, task: &Task) -> TaskResult {
        tracing::info!(task_id = %task.id, product = %task.config.monitor_input, "demo checkout attempt");
        TaskResult {
            success: true,
            order_number: Some(format!("DEMO-{}", task.id.simple())),
            checkout_url: Some(task.config.site_url.clone()),
            error_message: None,
            elapsed_secs: Some(0.1),
            total_price: Some(180.0),
            timestamp_ms: common::time::now_ms(),
        }
    }
}
