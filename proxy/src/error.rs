use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("invalid proxy format: {0}")]
    InvalidFormat(String),

    #[error("no proxies available for group {group:?}")]
    NoneAvailable { group: Option<String> },

    #[error("unknown proxy id: {0}")]
    UnknownProxy(String),

    #[error("proxy test request failed: {0}")]
    TestFailed(#[from] reqwest::Error),
}
