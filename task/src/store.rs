//! In-memory task table. Persistence lives outside the core (DBs the
//! broader product layers on top are collaborators); this crate exposes
//! a `TaskStore` trait seam with a `DashMap`-backed in-memory
//! implementation and no backing store of its own.

use dashmap::DashMap;

use crate::model::{Task, TaskId};

#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    async fn upsert(&self, task: Task);
    async fn get(&self, id: TaskId) -> Option<Task>;
    async fn remove(&self, id: TaskId) -> Option<Task>;
    async fn all(&self) -> Vec<Task>;
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<TaskId, Task>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn upsert(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    async fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.get(&id).map(|e| e.clone())
    }

    async fn remove(&self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id).map(|(_, t)| t)
    }

    async fn all(&self) -> Vec<Task> {
        self.tasks.iter().map(|e| e.clone()).collect()
    }
}
