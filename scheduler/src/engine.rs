//! Bounded-concurrency task executor: one semaphore permit per running
//! task, per-domain rate limiting, bounded jittered retries, and prompt
//! cancellation. Per-key indexed state is guarded by a mutex and dispatch
//! is driven by a generic executor dependency (see `handler.rs`).

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;

use common::time::now_ms;
use task::{InMemoryTaskStore, Task, TaskConfig, TaskId, TaskStatus, TaskStore};

use crate::backoff::compute_backoff;
use crate::handler::CheckoutHandler;
use crate::notifier::{NoopNotifier, Notifier};
use crate::types::{SchedulerConfig, SchedulerStats};

type StatusCallback = dyn Fn(&Task) + Send + Sync;

struct TaskControl {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    config: SchedulerConfig,
    handler: Arc<dyn CheckoutHandler>,
    notifier: Arc<dyn Notifier>,
    semaphore: Arc<Semaphore>,
    store: Arc<InMemoryTaskStore>,
    site_locks: DashMap<String, Arc<Mutex<u64>>>,
    controls: DashMap<TaskId, TaskControl>,
    dedup: DashMap<(String, String, String), TaskId>,
    on_status_change: Mutex<Vec<Arc<StatusCallback>>>,
    on_success: Mutex<Vec<Arc<StatusCallback>>>,
    retry_totals: DashMap<TaskId, u32>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, handler: Arc<dyn CheckoutHandler>) -> Arc<Self> {
        Self::with_notifier(config, handler, Arc::new(NoopNotifier))
    }

    pub fn with_notifier(config: SchedulerConfig, handler: Arc<dyn CheckoutHandler>, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            handler,
            notifier,
            store: Arc::new(InMemoryTaskStore::new()),
            site_locks: DashMap::new(),
            controls: DashMap::new(),
            dedup: DashMap::new(),
            on_status_change: Mutex::new(Vec::new()),
            on_success: Mutex::new(Vec::new()),
            retry_totals: DashMap::new(),
        })
    }

    pub async fn on_status_change(&self, cb: Arc<StatusCallback>) {
        self.on_status_change.lock().await.push(cb);
    }

    pub async fn on_success(&self, cb: Arc<StatusCallback>) {
        self.on_success.lock().await.push(cb);
    }

    /// Submits a new task and spawns its run loop; never blocks on the
    /// concurrency bound itself — the spawned task waits on the semaphore.
    pub async fn submit(self: &Arc<Self>, config: TaskConfig) -> TaskId {
        let task = Task::new(config);
        let task_id = task.id;
        self.store.upsert(task).await;
        self.spawn_run(task_id);
        task_id
    }

    /// Auto-task creation from a Monitor Engine match. Skips creating a
    /// second task for `(site_url, product_url, profile_id)` while a prior
    /// one is still non-terminal.
    pub async fn submit_auto(self: &Arc<Self>, config: TaskConfig, product_url: String) -> Option<TaskId> {
        let key = (config.site_url.clone(), product_url, config.profile_id.clone());
        if let Some(existing) = self.dedup.get(&key) {
            if let Some(task) = self.store.get(*existing).await {
                if !task.status.is_terminal() {
                    return None;
                }
            }
        }
        let task_id = self.submit(config).await;
        self.dedup.insert(key, task_id);
        Some(task_id)
    }

    /// Sets the task's cancel flag, aborts its execution handle (releasing
    /// the semaphore permit), and interrupts an in-progress retry sleep.
    pub async fn stop(&self, task_id: TaskId) -> bool {
        let Some((_, control)) = self.controls.remove(&task_id) else { return false };
        control.cancelled.store(true, Ordering::SeqCst);
        control.notify.notify_waiters();
        control.handle.abort();
        if let Some(mut task) = self.store.get(task_id).await {
            // A task that already reached a terminal status (the run loop
            // finished and removed its own control entry) cannot be
            // clobbered back to `Cancelled` by a racing `stop`/`stop_all`.
            if !task.status.is_terminal() {
                task.update_status(TaskStatus::Cancelled, "cancelled");
                self.store.upsert(task).await;
            }
        }
        true
    }

    /// Cancels every currently-tracked task. Returns the count signaled,
    /// not the count that have actually finished unwinding.
    pub async fn stop_all(&self) -> usize {
        let ids: Vec<TaskId> = self.controls.iter().map(|e| *e.key()).collect();
        let mut signaled = 0;
        for id in ids {
            if self.stop(id).await {
                signaled += 1;
            }
        }
        signaled
    }

    /// Polls the task table until `task_id` reaches a terminal status.
    /// Returns `None` if the task was never submitted.
    pub async fn wait_for_terminal(&self, task_id: TaskId) -> Option<Task> {
        loop {
            let task = self.store.get(task_id).await?;
            if task.status.is_terminal() {
                return Some(task);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn stats(&self) -> SchedulerStats {
        let tasks = self.store.all().await;
        let mut stats = SchedulerStats { total: tasks.len(), ..Default::default() };
        let mut elapsed_sum = 0.0;
        let mut elapsed_count = 0u64;

        for task in &tasks {
            match task.status {
                TaskStatus::Running | TaskStatus::Starting => stats.running += 1,
                TaskStatus::Idle => stats.idle += 1,
                TaskStatus::Success => stats.success += 1,
                TaskStatus::Failed | TaskStatus::Error => stats.failed += 1,
                TaskStatus::Declined => stats.declined += 1,
                TaskStatus::Cancelled => {}
            }
            if let Some(result) = &task.result {
                if let Some(elapsed) = result.elapsed_secs {
                    elapsed_sum += elapsed;
                    elapsed_count += 1;
                }
            }
        }

        stats.avg_checkout_time_seconds = if elapsed_count > 0 { Some(elapsed_sum / elapsed_count as f64) } else { None };
        stats.total_retries = self.retry_totals.iter().map(|e| *e.value() as u64).sum();
        stats
    }

    fn spawn_run(self: &Arc<Self>, task_id: TaskId) {
        let scheduler = Arc::clone(self);
        let cancelled = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let cancelled_for_task = Arc::clone(&cancelled);
        let notify_for_task = Arc::clone(&notify);

        let handle = tokio::spawn(async move {
            scheduler.run_task(task_id, cancelled_for_task, notify_for_task).await;
        });

        self.controls.insert(task_id, TaskControl { cancelled, notify, handle });
    }

    async fn run_task(self: Arc<Self>, task_id: TaskId, cancelled: Arc<AtomicBool>, notify: Arc<Notify>) {
        let _permit = self.semaphore.clone().acquire_owned().await.expect("semaphore never closed");

        let Some(mut task) = self.store.get(task_id).await else { return };
        let domain = task.site_domain();
        let started_at = now_ms();
        let mut retry_count = 0u32;

        task.update_status(TaskStatus::Running, "running");
        self.store.upsert(task.clone()).await;
        self.fire_status_change(&task).await;

        loop {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }

            if let Some(domain) = &domain {
                self.wait_for_site_slot(domain).await;
            }

            let result = self.handler.attempt(&task).await;
            if cancelled.load(Ordering::SeqCst) {
                return;
            }

            let is_decline = result
                .error_message
                .as_deref()
                .map(|m| m.starts_with("declined:"))
                .unwrap_or(false);

            if result.success {
                let mut finished = result.clone();
                finished.elapsed_secs.get_or_insert((now_ms().saturating_sub(started_at)) as f64 / 1000.0);
                task.result = Some(finished);
                task.update_status(TaskStatus::Success, "success");
                self.store.upsert(task.clone()).await;
                self.fire_status_change(&task).await;
                self.fire_success(&task).await;
                self.notifier.on_success(&task, task.result.as_ref().unwrap()).await;
                self.controls.remove(&task_id);
                return;
            }

            task.result = Some(result.clone());
            let retryable = if is_decline { task.config.retry_on_decline } else { task.config.retry_on_error };

            if !retryable || retry_count >= task.config.max_retries {
                task.update_status(if is_decline { TaskStatus::Declined } else { TaskStatus::Failed }, result.error_message.clone().unwrap_or_default());
                self.store.upsert(task.clone()).await;
                self.fire_status_change(&task).await;
                if is_decline {
                    self.notifier.on_decline(&task, &result).await;
                }
                self.controls.remove(&task_id);
                return;
            }

            retry_count += 1;
            task.retry_count = retry_count;
            self.retry_totals.insert(task_id, retry_count);
            task.update_status(TaskStatus::Running, format!("retrying (attempt {})", retry_count + 1));
            self.store.upsert(task.clone()).await;
            self.fire_status_change(&task).await;

            let backoff = compute_backoff(task.config.retry_delay_ms, retry_count);
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = notify.notified() => {
                    if cancelled.load(Ordering::SeqCst) {
                        return;
                    }
                }
            }
        }
    }

    async fn wait_for_site_slot(&self, domain: &str) {
        let lock = self
            .site_locks
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .clone();
        let mut last = lock.lock().await;
        let now = now_ms();
        let elapsed = now.saturating_sub(*last);
        if *last > 0 && elapsed < self.config.min_site_delay_ms {
            tokio::time::sleep(Duration::from_millis(self.config.min_site_delay_ms - elapsed)).await;
        }
        *last = now_ms();
    }

    async fn fire_status_change(&self, task: &Task) {
        for cb in self.on_status_change.lock().await.iter() {
            let _ = panic::catch_unwind(AssertUnwindSafe(|| cb(task)));
        }
    }

    async fn fire_success(&self, task: &Task) {
        for cb in self.on_success.lock().await.iter() {
            let _ = panic::catch_unwind(AssertUnwindSafe(|| cb(task)));
        }
    }
}
