//! Task storage trait and types.

use std::fmt;

use crate::task::Task;

/// Error type for task store operations.
#[derive(Debug)]
pub enum TaskStoreError {
    /// Task not found.
    NotFound(String),
    /// A task with this id is already stored.
    Duplicate(String),
    /// The store lock was poisoned by a panicking writer.
    LockPoisoned,
    /// Database error.
    Database(String),
}

impl fmt::Display for TaskStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStoreError::NotFound(id) => write!(f, "Task not found: {}", id),
            TaskStoreError::Duplicate(id) => write!(f, "Task already exists: {}", id),
            TaskStoreError::LockPoisoned => write!(f, "Task store lock poisoned"),
            TaskStoreError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for TaskStoreError {}

impl From<rusqlite::Error> for TaskStoreError {
    fn from(e: rusqlite::Error) -> Self {
        TaskStoreError::Database(e.to_string())
    }
}

/// Storage for live tasks and their archived history.
///
/// Every method runs under a single writer lock, so no caller ever observes a
/// half-applied operation. In particular `save_history` appends to history and
/// removes from the active collection as one step.
pub trait TaskStore: Send + Sync {
    /// Insert a new active task. Fails if the id is active or archived.
    fn add(&self, task: &Task) -> Result<(), TaskStoreError>;

    /// Insert several active tasks at once.
    fn add_batch(&self, tasks: &[Task]) -> Result<(), TaskStoreError> {
        for task in tasks {
            self.add(task)?;
        }
        Ok(())
    }

    /// Get an active task by id.
    fn get(&self, id: &str) -> Result<Option<Task>, TaskStoreError>;

    /// List active tasks, oldest first.
    fn list(&self) -> Result<Vec<Task>, TaskStoreError>;

    /// Overwrite an active task. Returns `false` if it is no longer active.
    fn update(&self, task: &Task) -> Result<bool, TaskStoreError>;

    /// Remove an active task, returning it.
    fn remove(&self, id: &str) -> Result<Task, TaskStoreError>;

    /// Append the task to history and drop it from the active collection.
    fn save_history(&self, task: &Task) -> Result<(), TaskStoreError>;

    /// Get the most recent history record for an id.
    fn get_history(&self, id: &str) -> Result<Option<Task>, TaskStoreError>;

    /// List history records in archival order.
    fn list_history(&self) -> Result<Vec<Task>, TaskStoreError>;
}
