//! Trait seams for the external collaborators the core calls out to but
//! never implements itself: one trait per collaborator, `async_trait`,
//! `Send + Sync + 'static`, so engines can be tested against fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Profile;

#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn get(&self, id: &str) -> Option<Profile>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptchaType {
    RecaptchaV2,
    RecaptchaV3,
    HCaptcha,
    FunCaptcha,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaRequest {
    pub page_url: String,
    pub site_key: String,
    pub captcha_type: CaptchaType,
    pub action: Option<String>,
    pub min_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaResolution {
    pub success: bool,
    pub token: Option<String>,
    pub error: Option<String>,
    pub elapsed_secs: f64,
    pub cost_usd: f64,
    pub provider_name: String,
}

/// Pluggable captcha-solving collaborator. A headless deployment may have
/// no harvester implementation; callers that don't register one simply
/// skip straight to provider-order fallback, which in this design means
/// `solver` is `Option<Arc<dyn CaptchaSolver>>` at the call site rather
/// than a required dependency.
#[async_trait]
pub trait CaptchaSolver: Send + Sync + 'static {
    async fn solve(&self, request: CaptchaRequest) -> CaptchaResolution;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAnalysis {
    pub best_resale: f64,
    pub estimated_profit: f64,
    pub margin_pct: f64,
}

/// Optional read-only oracle; absence does not affect core correctness.
#[async_trait]
pub trait PriceOracle: Send + Sync + 'static {
    async fn analyze(&self, sku: &str, retail: f64) -> Option<PriceAnalysis>;
}
