//! Task entity, lifecycle and storage.

mod memory_store;
mod sqlite_store;
mod store;
mod types;

pub use memory_store::MemoryTaskStore;
pub use sqlite_store::SqliteTaskStore;
pub use store::{TaskStore, TaskStoreError};
pub use types::{DownloadMode, InvalidTransition, Metadata, Source, Task, TaskStatus};
