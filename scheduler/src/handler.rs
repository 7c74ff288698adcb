//! The seam between the scheduler's bounded-concurrency/retry machinery
//! and whatever actually runs an attempt (the checkout engine in
//! production, a scripted stand-in in tests). The scheduler engine is
//! generic over this executor dependency rather than depending on
//! `checkout` directly.

use async_trait::async_trait;

use task::{Task, TaskResult};

#[async_trait]
pub trait CheckoutHandler: Send + Sync {
    async fn attempt(&self, task: &Task) -> TaskResult;
}
