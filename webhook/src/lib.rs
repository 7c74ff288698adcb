pub mod error;
pub mod hmac_auth;
pub mod idempotency;
pub mod rate_limit;
pub mod service;
pub mod types;

pub use error::WebhookError;
pub use service::{WebhookHandler, WebhookService};
pub use types::{WebhookConfig, WebhookReceived, WebhookStats};
