//! Session Factory: builds one `reqwest::Client` per task, each with its
//! own cookie jar, its own (optionally seeded) browser identity, and
//! optionally routed through a proxy.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use proxy::Proxy;

use crate::identity::BrowserIdentity;
use crate::impersonation::{FallbackBackend, ImpersonationBackend};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

pub struct SessionFactory {
    backend: Arc<dyn ImpersonationBackend>,
    timeout: Duration,
}

impl Default for SessionFactory {
    fn default() -> Self {
        Self::new(Arc::new(FallbackBackend))
    }
}

impl SessionFactory {
    pub fn new(backend: Arc<dyn ImpersonationBackend>) -> Self {
        Self { backend, timeout: Duration::from_secs(30) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds a fresh client with its own cookie jar.
    ///
    /// `seed`, typically a task id, makes the synthesized browser identity
    /// (and therefore header set) reproducible across reconnects for the
    /// same task while still varying between tasks.
    pub fn create(
        &self,
        seed: Option<&str>,
        proxy: Option<&Proxy>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Client, SessionError> {
        let identity = BrowserIdentity::generate(seed);
        let mut headers = self.backend.headers(&identity);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .cookie_store(true)
            .default_headers(headers);

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.url())?);
        }

        Ok(builder.build()?)
    }

    pub fn header(name: &'static str, value: &str) -> Option<(HeaderName, HeaderValue)> {
        HeaderValue::from_str(value).ok().map(|v| (HeaderName::from_static(name), v))
    }
}
