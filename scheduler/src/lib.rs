pub mod backoff;
pub mod engine;
pub mod handler;
pub mod notifier;
pub mod types;

pub use engine::Scheduler;
pub use handler::CheckoutHandler;
pub use notifier::{NoopNotifier, Notifier};
pub use types::{SchedulerConfig, SchedulerStats};
