//! Shopify `SiteMonitor`: polls a storefront's public `/products.json`
//! catalog endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use common::time::now_ms;

use crate::http::ProductHttp;
use crate::site::SiteMonitor;
use crate::types::{MonitorResult, ProductObservation};

pub struct ShopifyMonitor {
    http: Arc<dyn ProductHttp>,
    store_url: String,
}

impl ShopifyMonitor {
    pub fn new(http: Arc<dyn ProductHttp>, store_url: impl Into<String>) -> Self {
        Self { http, store_url: store_url.into() }
    }

    fn products_json_url(&self) -> String {
        format!("{}/products.json?limit=250", self.store_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SiteMonitor for ShopifyMonitor {
    async fn check(&self) -> MonitorResult {
        let body = match self.http.get(&self.products_json_url()).await {
            Ok(body) => body,
            Err(err) if err.contains("429") => return MonitorResult::RateLimited,
            Err(err) => return MonitorResult::Error(err),
        };
        MonitorResult::Products(parse_products_json(&self.store_url, &body))
    }
}

pub fn parse_products_json(store_url: &str, body: &str) -> Vec<ProductObservation> {
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
            let handle = p.get("handle").and_then(|v| v.as_str())?;
            let title = p.get("title").and_then(|v| v.as_str())?.to_string();
            let variants = p.get("variants").and_then(|v| v.as_array()).cloned().unwrap_or_default();

            let mut sizes = Vec::new();
            let mut variant_ids = Vec::new();
            let mut price = None;
            for variant in &variants {
                let available = variant.get("available").and_then(|v| v.as_bool()).unwrap_or(false);
                let size = variant.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let id = variant.get("id").and_then(|v| v.as_u64()).map(|id| id.to_string());
                if price.is_none() {
                    price = variant.get("price").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok());
                }
                if available {
                    if let Some(id) = id.clone() {
                        variant_ids.push((id, size.clone()));
                    }
                    sizes.push(size);
                }
            }

            Some(ProductObservation {
                url: format!("{}/products/{}", store_url.trim_end_matches('/'), handle),
                title,
                sku: p.get("id").and_then(|v| v.as_u64()).map(|id| id.to_string()),
                price,
                image_url: p
                    .get("images")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|img| img.get("src"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                available: !sizes.is_empty(),
                available_sizes: sizes,
                variant_ids,
                observed_at_ms: now_ms(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "products": [
            {
                "id": 123,
                "handle": "air-jordan-1",
                "title": "Air Jordan 1 Retro High OG",
                "images": [{"src": "https://cdn.example.com/aj1.jpg"}],
                "variants": [
                    {"id": 111, "title": "9", "available": false, "price": "180.00"},
                    {"id": 112, "title": "10", "available": true, "price": "180.00"}
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_available_sizes_and_skips_unavailable_ones() {
        let products = parse_products_json("https://store.example.com", SAMPLE);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].available_sizes, vec!["10"]);
        assert_eq!(products[0].url, "https://store.example.com/products/air-jordan-1");
        assert!(products[0].available);
    }

    #[test]
    fn malformed_json_yields_no_products_instead_of_erroring() {
        assert!(parse_products_json("https://store.example.com", "not json").is_empty());
    }

    struct ScriptedHttp(&'static str);

    #[async_trait]
    impl ProductHttp for ScriptedHttp {
        async fn get(&self, _url: &str) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn check_turns_a_catalog_response_into_product_observations() {
        let monitor = ShopifyMonitor::new(Arc::new(ScriptedHttp(SAMPLE)), "https://store.example.com");
        match monitor.check().await {
            MonitorResult::Products(products) => {
                assert_eq!(products.len(), 1);
                assert_eq!(products[0].title, "Air Jordan 1 Retro High OG");
            }
            other => panic!("expected Products, got a different MonitorResult variant: {other:?}"),
        }
    }
}
