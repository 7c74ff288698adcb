//! The webhook ingress pipeline: verify → rate-limit → dedupe → normalize →
//! persist → fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info};

use common::ring::RingBuffer;
use common::time::now_ms;

use crate::error::WebhookError;
use crate::hmac_auth::verify_signature;
use crate::idempotency::IdempotencyStore;
use crate::rate_limit::SlidingWindowRateLimiter;
use crate::types::{WebhookConfig, WebhookReceived, WebhookStats, event_type_of};

const DEFAULT_EVENT_LOG_CAP: usize = 500;

#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, event: &WebhookReceived);
}

pub struct WebhookService {
    configs: DashMap<String, WebhookConfig>,
    rate_limiter: SlidingWindowRateLimiter,
    idempotency: IdempotencyStore,
    handlers: Mutex<Vec<Arc<dyn WebhookHandler>>>,
    events: Mutex<RingBuffer<WebhookReceived>>,
}

impl Default for WebhookService {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookService {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
            rate_limiter: SlidingWindowRateLimiter::new(),
            idempotency: IdempotencyStore::new(3600),
            handlers: Mutex::new(Vec::new()),
            events: Mutex::new(RingBuffer::new(DEFAULT_EVENT_LOG_CAP)),
        }
    }

    pub fn configure_source(&self, source: impl Into<String>, config: WebhookConfig) {
        let source = source.into();
        info!(source, "webhook source configured");
        self.configs.insert(source, config);
    }

    pub async fn register_handler(&self, handler: Arc<dyn WebhookHandler>) {
        self.handlers.lock().await.push(handler);
    }

    pub async fn receive(
        &self,
        source: &str,
        payload: Value,
        signature: Option<&str>,
        idempotency_key: Option<&str>,
    ) -> Result<WebhookReceived, WebhookError> {
        let config = self.configs.get(source).map(|c| c.value().clone());

        if let Some(config) = &config {
            if let Some(secret) = &config.hmac_secret {
                let signature = signature.ok_or(WebhookError::Unauthorized)?;
                if !verify_signature(&payload, signature, secret) {
                    return Err(WebhookError::Unauthorized);
                }
            }
        }

        let (max_requests, window_secs) = config
            .as_ref()
            .map(|c| (c.rate_limit_max, c.rate_limit_window_secs))
            .unwrap_or((60, 60));
        self.rate_limiter.check(source, max_requests, window_secs, now_ms())?;

        if let Some(key) = idempotency_key {
            self.idempotency.check_and_mark(key, now_ms())?;
        }

        let event = WebhookReceived {
            id: idempotency_key.unwrap_or_default().to_string(),
            source: source.to_string(),
            event_type: event_type_of(&payload),
            payload,
            timestamp_ms: now_ms(),
        };

        self.events.lock().await.push(event.clone());

        let handlers = self.handlers.lock().await.clone();
        for handler in handlers {
            handler.handle(&event).await;
        }

        info!(source, event_type = %event.event_type, "webhook processed");
        Ok(event)
    }

    pub async fn recent_events(&self, limit: usize) -> Vec<WebhookReceived> {
        let events = self.events.lock().await;
        events.iter().rev().take(limit).cloned().collect()
    }

    pub async fn stats(&self) -> WebhookStats {
        WebhookStats {
            total_received: self.events.lock().await.len(),
            idempotency_keys_cached: self.idempotency.size(),
            configured_sources: self.configs.iter().map(|e| e.key().clone()).collect(),
        }
    }
}

/// Wraps a handler so one panicking/erroring subscriber never affects the
/// others or the caller's response — the handler trait itself is infallible,
/// so this only matters for handlers implemented atop fallible work.
pub struct LoggingHandler<F>(pub F);

#[async_trait]
impl<F> WebhookHandler for LoggingHandler<F>
where
    F: Fn(&WebhookReceived) -> Result<(), String> + Send + Sync,
{
    async fn handle(&self, event: &WebhookReceived) {
        if let Err(err) = (self.0)(event) {
            error!(source = %event.source, %err, "webhook handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn e5_hmac_good_then_duplicate_rejected() {
        let service = WebhookService::new();
        service.configure_source("s", WebhookConfig::new().with_secret("k"));
        let payload = json!({"event_type": "ping"});
        let sig = crate::hmac_auth::expected_signature(&payload, "k");

        let first = service.receive("s", payload.clone(), Some(&sig), Some("i1")).await;
        assert!(first.is_ok());

        let second = service.receive("s", payload, Some(&sig), Some("i1")).await;
        assert_eq!(second.unwrap_err(), WebhookError::Duplicate);
    }

    #[tokio::test]
    async fn wrong_signature_is_unauthorized() {
        let service = WebhookService::new();
        service.configure_source("s", WebhookConfig::new().with_secret("k"));
        let payload = json!({"event_type": "ping"});
        let err = service.receive("s", payload, Some("sha256=bad"), None).await.unwrap_err();
        assert_eq!(err, WebhookError::Unauthorized);
    }

    #[tokio::test]
    async fn e6_third_submission_within_window_is_rate_limited() {
        let service = WebhookService::new();
        service.configure_source("s", WebhookConfig::new().with_rate_limit(2, 60));
        for _ in 0..2 {
            assert!(service.receive("s", json!({"type": "x"}), None, None).await.is_ok());
        }
        let err = service.receive("s", json!({"type": "x"}), None, None).await.unwrap_err();
        match err {
            WebhookError::RateLimited { retry_after_secs } => assert!(retry_after_secs >= 1),
            _ => panic!("expected RateLimited"),
        }
    }

    #[tokio::test]
    async fn fan_out_reaches_every_registered_handler() {
        let service = WebhookService::new();
        let calls = Arc::new(AtomicUsize::new(0));

        struct Counter(Arc<AtomicUsize>);
        #[async_trait]
        impl WebhookHandler for Counter {
            async fn handle(&self, _event: &WebhookReceived) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        service.register_handler(Arc::new(Counter(calls.clone()))).await;
        service.register_handler(Arc::new(Counter(calls.clone()))).await;
        service.receive("s", json!({"type": "x"}), None, None).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_config_means_unauthenticated_and_default_rate_limit() {
        let service = WebhookService::new();
        let result = service.receive("unconfigured", json!({"type": "x"}), None, None).await;
        assert!(result.is_ok());
    }
}
