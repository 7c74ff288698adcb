//! Per-site inventory check, the one thing a concrete monitor
//! implementation (Shopify storefront, Footsites brand, ...) must supply.

use async_trait::async_trait;

use crate::types::MonitorResult;

#[async_trait]
pub trait SiteMonitor: Send + Sync {
    async fn check(&self) -> MonitorResult;
}
