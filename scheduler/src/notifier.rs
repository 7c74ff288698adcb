//! Fire-and-forget outcome notifications, deferred out of `common` because
//! it needs `Task`/`TaskResult`. Modeled as typed callbacks rather than
//! ad-hoc coroutine chains; implementations may be no-ops.

use async_trait::async_trait;

use task::{Task, TaskResult};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_success(&self, task: &Task, result: &TaskResult);
    async fn on_decline(&self, task: &Task, result: &TaskResult);
    async fn on_restock(&self, site_name: &str, product_url: &str);
    async fn on_carted(&self, task: &Task);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn on_success(&self, _task: &Task, _result: &TaskResult) {}
    async fn on_decline(&self, _task: &Task, _result: &TaskResult) {}
    async fn on_restock(&self, _site_name: &str, _product_url: &str) {}
    async fn on_carted(&self, _task: &Task) {}
}
