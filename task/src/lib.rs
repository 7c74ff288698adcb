pub mod model;
pub mod store;

pub use model::{FoundProduct, SiteType, Task, TaskConfig, TaskId, TaskResult, TaskStatus};
pub use store::{InMemoryTaskStore, TaskStore};
