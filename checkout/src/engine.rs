//! Ties a `Task`, a `Profile`, and an optional `Proxy` into one checkout
//! attempt, dispatching to the Shopify or Footsites state machine per
//! `task.config.site_type`.
//!
//! Per-attempt invariant: exactly one proxy, one profile, one cookie jar,
//! and one browser identity are used for the whole attempt, and this
//! function never propagates an error out to its caller — every outcome,
//! including a session-build failure, comes back as a `TaskResult` so the
//! scheduler's retry bookkeeping is the only place a failure is judged.

use httpsession::factory::SessionFactory;
use proxy::Proxy;
use task::model::{SiteType, url_domain};
use task::{Task, TaskResult};

use common::domain::Profile;

use crate::http::ReqwestHttp;
use crate::sleeper::TokioSleeper;
use crate::types::FootsitesBrandConfig;
use crate::{footsites, shopify};

fn now_ms() -> u64 {
    common::time::now_ms()
}

fn failed(message: impl Into<String>) -> TaskResult {
    TaskResult {
        success: false,
        error_message: Some(message.into()),
        timestamp_ms: now_ms(),
        ..Default::default()
    }
}

fn brand_for_domain(site_url: &str) -> FootsitesBrandConfig {
    match url_domain(site_url).as_deref() {
        Some(d) if d.contains("champssports") => FootsitesBrandConfig::champs(),
        Some(d) if d.contains("eastbay") => FootsitesBrandConfig::eastbay(),
        Some(d) if d.contains("finishline") => FootsitesBrandConfig::finish_line(),
        _ => FootsitesBrandConfig::foot_locker(),
    }
}

pub struct CheckoutEngine {
    session_factory: SessionFactory,
}

impl Default for CheckoutEngine {
    fn default() -> Self {
        Self { session_factory: SessionFactory::default() }
    }
}

impl CheckoutEngine {
    pub fn new(session_factory: SessionFactory) -> Self {
        Self { session_factory }
    }

    /// Runs exactly one checkout attempt for `task` and always returns a
    /// `TaskResult` — the scheduler decides whether to retry.
    pub async fn run_attempt(&self, task: &Task, profile: &Profile, proxy: Option<&Proxy>) -> TaskResult {
        let client = match self.session_factory.create(Some(&task.id.to_string()), proxy, None) {
            Ok(client) => client,
            Err(err) => return failed(format!("session build failed: {err}")),
        };
        let http = ReqwestHttp::new(client);
        let sleeper = TokioSleeper;

        match task.config.site_type {
            SiteType::Shopify => {
                let variant_id = task
                    .found_product
                    .as_ref()
                    .and_then(|p| p.variant_id.clone())
                    .unwrap_or_else(|| task.config.monitor_input.clone());
                shopify::run(&http, &sleeper, &task.config.site_url, &variant_id, profile).await
            }
            SiteType::Footsites => {
                let brand = brand_for_domain(&task.config.site_url);
                let size = task.config.sizes.first().cloned().unwrap_or_default();
                footsites::run(&http, &sleeper, &brand, &task.config.monitor_input, &size, profile).await
            }
        }
    }
}
