//! In-process task store. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Task, TaskStore, TaskStoreError};

#[derive(Debug, Default)]
struct Inner {
    active: HashMap<String, Task>,
    history: Vec<Task>,
}

impl Inner {
    /// Ids are reserved for good once used, archived or not.
    fn contains(&self, id: &str) -> bool {
        self.active.contains_key(id) || self.history.iter().any(|t| t.id == id)
    }
}

/// Ephemeral task store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, TaskStoreError> {
        self.inner.lock().map_err(|_| TaskStoreError::LockPoisoned)
    }
}

impl TaskStore for MemoryTaskStore {
    fn add(&self, task: &Task) -> Result<(), TaskStoreError> {
        let mut inner = self.lock()?;
        if inner.contains(&task.id) {
            return Err(TaskStoreError::Duplicate(task.id.clone()));
        }
        inner.active.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn add_batch(&self, tasks: &[Task]) -> Result<(), TaskStoreError> {
        let mut inner = self.lock()?;
        if let Some(dup) = tasks.iter().find(|t| inner.contains(&t.id)) {
            return Err(TaskStoreError::Duplicate(dup.id.clone()));
        }
        for task in tasks {
            inner.active.insert(task.id.clone(), task.clone());
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Task>, TaskStoreError> {
        Ok(self.lock()?.active.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Task>, TaskStoreError> {
        let mut tasks: Vec<Task> = self.lock()?.active.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn update(&self, task: &Task) -> Result<bool, TaskStoreError> {
        let mut inner = self.lock()?;
        match inner.active.get_mut(&task.id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: &str) -> Result<Task, TaskStoreError> {
        self.lock()?
            .active
            .remove(id)
            .ok_or_else(|| TaskStoreError::NotFound(id.to_string()))
    }

    fn save_history(&self, task: &Task) -> Result<(), TaskStoreError> {
        let mut inner = self.lock()?;
        inner.history.push(task.clone());
        inner.active.remove(&task.id);
        Ok(())
    }

    fn get_history(&self, id: &str) -> Result<Option<Task>, TaskStoreError> {
        Ok(self
            .lock()?
            .history
            .iter()
            .rev()
            .find(|t| t.id == id)
            .cloned())
    }

    fn list_history(&self) -> Result<Vec<Task>, TaskStoreError> {
        Ok(self.lock()?.history.clone())
    }
}
