use thiserror::Error;

/// Semantic error taxonomy shared across the core. Individual crates still
/// define their own leaf error enums (see `proxy::Error`, `checkout::Error`,
/// ...); this is the shape those get mapped into at a boundary that needs a
/// caller-facing kind (e.g. the webhook pipeline).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}
