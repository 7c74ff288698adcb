//! Thin HTTP seam the state machines run against, so unit tests can script
//! responses instead of hitting real storefronts: one `#[async_trait]`
//! boundary that normalizes everything below it.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CheckoutError;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after following redirects.
    pub url: String,
    pub body: String,
}

#[async_trait]
pub trait CheckoutHttp: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, CheckoutError>;
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, CheckoutError>;
    async fn post_json(&self, url: &str, json: &Value) -> Result<HttpResponse, CheckoutError>;
}

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn to_response(resp: reqwest::Response) -> Result<HttpResponse, CheckoutError> {
        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let body = resp.text().await?;
        Ok(HttpResponse { status, url, body })
    }
}

#[async_trait]
impl CheckoutHttp for ReqwestHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, CheckoutError> {
        let resp = self.client.get(url).send().await?;
        Self::to_response(resp).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, CheckoutError> {
        let resp = self.client.post(url).form(form).send().await?;
        Self::to_response(resp).await
    }

    async fn post_json(&self, url: &str, json: &Value) -> Result<HttpResponse, CheckoutError> {
        let resp = self.client.post(url).json(json).send().await?;
        Self::to_response(resp).await
    }
}
