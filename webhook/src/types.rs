use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub hmac_secret: Option<String>,
    pub rate_limit_max: usize,
    pub rate_limit_window_secs: u64,
    pub idempotency_ttl_secs: u64,
}

impl WebhookConfig {
    pub fn new() -> Self {
        Self { hmac_secret: None, rate_limit_max: 60, rate_limit_window_secs: 60, idempotency_ttl_secs: 3600 }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.hmac_secret = Some(secret.into());
        self
    }

    pub fn with_rate_limit(mut self, max_requests: usize, window_secs: u64) -> Self {
        self.rate_limit_max = max_requests;
        self.rate_limit_window_secs = window_secs;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookReceived {
    pub id: String,
    pub source: String,
    pub event_type: String,
    pub payload: Value,
    pub timestamp_ms: u64,
}

pub fn event_type_of(payload: &Value) -> String {
    payload
        .get("event_type")
        .or_else(|| payload.get("type"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WebhookStats {
    pub total_received: usize,
    pub idempotency_keys_cached: usize,
    pub configured_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falls_back_from_event_type_to_type_to_unknown() {
        assert_eq!(event_type_of(&json!({"event_type": "ping"})), "ping");
        assert_eq!(event_type_of(&json!({"type": "restock"})), "restock");
        assert_eq!(event_type_of(&json!({})), "unknown");
    }
}
