//! Thin HTTP seam shipped `SiteMonitor` implementations poll through, so
//! unit tests can script catalog responses instead of hitting real storefront
//! APIs — mirrors `checkout::http`'s seam.

use async_trait::async_trait;

#[async_trait]
pub trait ProductHttp: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, String>;
}

pub struct ReqwestProductHttp {
    client: reqwest::Client,
}

impl ReqwestProductHttp {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProductHttp for ReqwestProductHttp {
    async fn get(&self, url: &str) -> Result<String, String> {
        let resp = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        if resp.status().as_u16() == 429 {
            return Err("429 rate limited".to_string());
        }
        resp.text().await.map_err(|e| e.to_string())
    }
}
