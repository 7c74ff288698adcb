use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("adyen encryption failed: {0}")]
    Adyen(#[from] crate::adyen::AdyenError),

    #[error("session factory error: {0}")]
    Session(#[from] httpsession::factory::SessionError),

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}
