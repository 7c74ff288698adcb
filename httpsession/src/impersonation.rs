//! TLS/header impersonation backend seam.
//!
//! No crate in reach of this workspace does real browser TLS
//! fingerprinting (JA3/JA4, H2 SETTINGS order, cipher suite order).
//! `FallbackBackend` instead implements the header-level fallback branch:
//! realistic header synthesis via [`crate::identity::BrowserIdentity`], no
//! TLS-layer spoofing. A real impersonation backend can be dropped in
//! later behind this trait without touching call sites.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::identity::BrowserIdentity;

pub trait ImpersonationBackend: Send + Sync {
    /// Builds the header set a [`crate::factory::SessionFactory`] should
    /// attach to every request for this identity.
    fn headers(&self, identity: &BrowserIdentity) -> HeaderMap;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackBackend;

impl ImpersonationBackend for FallbackBackend {
    fn headers(&self, identity: &BrowserIdentity) -> HeaderMap {
        warn!("TLS impersonation backend unavailable, falling back to plain HTTP client");

        let mut headers = HeaderMap::new();
        let mut set = |name: &'static str, value: &str| {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        };

        set("user-agent", &identity.user_agent);
        set(
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        );
        set("accept-language", &identity.accept_language_header());
        set("accept-encoding", "gzip, deflate, br");
        set("cache-control", "no-cache");
        set("pragma", "no-cache");
        set("sec-ch-ua", &identity.sec_ch_ua);
        set("sec-ch-ua-mobile", "?0");
        set("sec-ch-ua-platform", "\"Windows\"");

        headers
    }
}
