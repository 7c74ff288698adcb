//! Product observation and event vocabulary shared by every site monitor.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductObservation {
    pub url: String,
    pub title: String,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub available: bool,
    pub available_sizes: Vec<String>,
    pub variant_ids: Vec<(String, String)>, // variant_id -> size
    pub observed_at_ms: u64,
}

impl ProductObservation {
    /// `url + ':' + sorted(sizes).join(',')` — equal fingerprints on
    /// consecutive polls suppress duplicate events.
    pub fn fingerprint(&self) -> String {
        let mut sizes = self.available_sizes.clone();
        sizes.sort();
        format!("{}:{}", self.url, sizes.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    NewProduct,
    Restock,
    SizeChange,
    PriceChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductEvent {
    pub event_type: EventType,
    pub source: String,
    pub store_name: String,
    pub observation: ProductObservation,
    pub match_result: MatchResult,
    pub priority: Priority,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Starting,
    Running,
    Found,
    Error,
    Stopped,
    RateLimited,
}

/// What one tick's `Check()` call returns: either the current set of
/// observed products, a signal that the site is rate-limiting us, or an
/// unexpected error.
#[derive(Debug)]
pub enum MonitorResult {
    Products(Vec<ProductObservation>),
    RateLimited,
    Error(String),
}
