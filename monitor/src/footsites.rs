//! Footsites-family `SiteMonitor`: polls a brand's `/products/search` API
//! for a query.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use common::time::now_ms;

use crate::http::ProductHttp;
use crate::site::SiteMonitor;
use crate::types::{MonitorResult, ProductObservation};

pub struct FootsitesMonitor {
    http: Arc<dyn ProductHttp>,
    api_base: String,
    query: String,
}

impl FootsitesMonitor {
    pub fn new(http: Arc<dyn ProductHttp>, api_base: impl Into<String>, query: impl Into<String>) -> Self {
        Self { http, api_base: api_base.into(), query: query.into() }
    }

    fn search_url(&self) -> String {
        format!("{}/products/search?query={}&limit=24", self.api_base.trim_end_matches('/'), self.query)
    }
}

#[async_trait]
impl SiteMonitor for FootsitesMonitor {
    async fn check(&self) -> MonitorResult {
        let body = match self.http.get(&self.search_url()).await {
            Ok(body) => body,
            Err(err) if err.contains("429") => return MonitorResult::RateLimited,
            Err(err) => return MonitorResult::Error(err),
        };
        MonitorResult::Products(parse_search_response(&self.api_base, &body))
    }
}

pub fn parse_search_response(api_base: &str, body: &str) -> Vec<ProductObservation> {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };
    let Some(products) = parsed.get("products").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    products
        .iter()
        .filter_map(|p| {
            let id = p.get("id").and_then(|v| v.as_str())?;
            let title = p.get("name").and_then(|v| v.as_str())?.to_string();
            let variants = p.get("variants").and_then(|v| v.as_array()).cloned().unwrap_or_default();

            let mut sizes = Vec::new();
            let mut variant_ids = Vec::new();
            for variant in &variants {
                let available = variant.get("available").and_then(|v| v.as_bool()).unwrap_or(false);
                if !available {
                    continue;
                }
                let size = variant.get("size").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                if let Some(vid) = variant.get("id").and_then(|v| v.as_str()) {
                    variant_ids.push((vid.to_string(), size.clone()));
                }
                sizes.push(size);
            }

            Some(ProductObservation {
                url: format!("{}/products/{}", api_base.trim_end_matches('/'), id),
                title,
                sku: Some(id.to_string()),
                price: p.get("price").and_then(|v| v.as_f64()),
                image_url: p.get("imageUrl").and_then(|v| v.as_str()).map(|s| s.to_string()),
                available: !sizes.is_empty(),
                available_sizes: sizes,
                variant_ids,
                observed_at_ms: now_ms(),
            })
        })
        .collect()
}
