//! Task orchestrator implementation.
//!
//! Each execution owns its task: the value is loaded from the store, handed
//! to the downloader by `&mut`, and written back once the run is terminal.
//! An in-flight id set guarantees at most one execution per id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::{ExecutionMode, OrchestratorConfig};
use crate::downloader::{apply, DownloaderRegistry, ProgressSink};
use crate::metadata::MetadataResolver;
use crate::task::{Metadata, Task, TaskStatus, TaskStore, TaskStoreError};

use super::types::{BatchRequest, OrchestratorError, SubmitOutcome, TaskSpec};

/// Message for tasks found mid-download when the process starts.
const INTERRUPTED_MESSAGE: &str = "interrupted by restart";

/// Message for executions still waiting for a slot at shutdown.
const SHUTDOWN_MESSAGE: &str = "orchestrator is shutting down";

/// Persists downloader snapshots so pollers see live progress.
struct StoreProgressSink {
    store: Arc<dyn TaskStore>,
}

impl ProgressSink for StoreProgressSink {
    fn publish(&self, task: &Task) {
        if let Err(e) = self.store.update(task) {
            warn!(task_id = %task.id, error = %e, "Failed to persist task progress");
        }
    }
}

/// Removes its id from the in-flight set when dropped.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    task_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_set(&self.in_flight).remove(&self.task_id);
    }
}

fn lock_set(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    // The set holds plain ids; a panicked holder cannot leave it inconsistent.
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The task orchestrator.
#[derive(Clone)]
pub struct TaskOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn TaskStore>,
    registry: Arc<DownloaderRegistry>,
    resolver: Arc<dyn MetadataResolver>,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TaskOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn TaskStore>,
        registry: Arc<DownloaderRegistry>,
        resolver: Arc<dyn MetadataResolver>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));
        Self {
            config,
            store,
            registry,
            resolver,
            permits,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.config.mode
    }

    /// Stop handing out download slots.
    ///
    /// Running downloads finish normally; executions still waiting for a
    /// slot fail with a shutdown message instead of starting.
    pub fn shutdown(&self) {
        self.permits.close();
        info!("Orchestrator stopped accepting downloads");
    }

    /// Number of executions currently running or waiting for a permit.
    pub fn in_flight_count(&self) -> usize {
        lock_set(&self.in_flight).len()
    }

    /// Resolve an anime title into song candidates.
    pub async fn search_metadata(
        &self,
        anime_title: &str,
        token: Option<&str>,
    ) -> Result<Vec<Metadata>, OrchestratorError> {
        let title = anime_title.trim();
        if title.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "title cannot be empty".to_string(),
            ));
        }
        Ok(self.resolver.resolve(title, token).await?)
    }

    /// Store a new pending task.
    pub fn create_task(&self, spec: TaskSpec) -> Result<Task, OrchestratorError> {
        let task = spec.into_task()?;
        self.store.add(&task)?;
        info!(task_id = %task.id, source = %task.source, "Task created");
        Ok(task)
    }

    /// Resolve every title and store one pending task per song.
    ///
    /// A title that resolves to nothing, or whose resolution fails, still
    /// gets a single task without metadata so the operator can fill it in.
    pub async fn create_batch(&self, request: BatchRequest) -> Result<Vec<Task>, OrchestratorError> {
        if request.target_dir.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "target_dir cannot be empty".to_string(),
            ));
        }
        let titles: Vec<&str> = request
            .titles
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if titles.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "titles cannot be empty".to_string(),
            ));
        }

        let token = request.token.as_deref();
        let mut tasks = Vec::new();
        for title in titles {
            let resolved = match self.resolver.resolve(title, token).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(title, error = %e, "Metadata resolution failed, creating bare task");
                    Vec::new()
                }
            };

            if resolved.is_empty() {
                tasks.push(Task::new(
                    title,
                    request.target_dir.as_str(),
                    request.source,
                    request.dmhy_mode,
                ));
                continue;
            }
            for metadata in resolved {
                let task = Task::new(
                    metadata.anime_title.as_str(),
                    request.target_dir.as_str(),
                    request.source,
                    request.dmhy_mode,
                );
                tasks.push(task.with_metadata(metadata));
            }
        }

        self.store.add_batch(&tasks)?;
        info!(count = tasks.len(), "Batch created");
        Ok(tasks)
    }

    /// Create a task and execute it according to the configured mode.
    pub async fn submit(&self, spec: TaskSpec) -> Result<SubmitOutcome, OrchestratorError> {
        let task = self.create_task(spec)?;
        match self.config.mode {
            ExecutionMode::Background => Ok(SubmitOutcome::Accepted(self.start(&task.id)?)),
            ExecutionMode::Inline => {
                let (task, success) = self.run(&task.id).await?;
                Ok(SubmitOutcome::Finished { task, success })
            }
        }
    }

    /// Dispatch a stored task on the runtime and return immediately.
    ///
    /// The returned snapshot is the task as dispatched; poll `status` for
    /// progress.
    pub fn start(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        let (task, guard) = self.prepare(task_id)?;
        let snapshot = task.clone();

        let this = self.clone();
        tokio::spawn(async move {
            this.execute(task, guard).await;
        });

        Ok(snapshot)
    }

    /// Execute a stored task to a terminal status.
    pub async fn run(&self, task_id: &str) -> Result<(Task, bool), OrchestratorError> {
        let (task, guard) = self.prepare(task_id)?;
        Ok(self.execute(task, guard).await)
    }

    /// Claim the id and load a fresh attempt of the task.
    fn prepare(&self, task_id: &str) -> Result<(Task, InFlightGuard), OrchestratorError> {
        let guard = self.claim(task_id)?;
        let mut task = self
            .store
            .get(task_id)?
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;

        if task.status != TaskStatus::Pending {
            debug!(task_id, status = %task.status, "Resetting task for a new attempt");
            task.reset_for_retry();
            self.store.update(&task)?;
        }
        Ok((task, guard))
    }

    fn claim(&self, task_id: &str) -> Result<InFlightGuard, OrchestratorError> {
        if !lock_set(&self.in_flight).insert(task_id.to_string()) {
            return Err(OrchestratorError::AlreadyRunning(task_id.to_string()));
        }
        Ok(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            task_id: task_id.to_string(),
        })
    }

    async fn execute(&self, mut task: Task, _guard: InFlightGuard) -> (Task, bool) {
        let sink = StoreProgressSink {
            store: Arc::clone(&self.store),
        };

        let success = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(_permit) => self.registry.dispatch(&mut task, &sink).await,
            Err(_) => {
                let id = task.id.clone();
                apply(&id, task.fail(SHUTDOWN_MESSAGE));
                false
            }
        };

        self.finish(&task, success);
        (task, success)
    }

    /// Persist the final record and archive it on success.
    fn finish(&self, task: &Task, success: bool) {
        if let Err(e) = self.store.update(task) {
            error!(task_id = %task.id, error = %e, "Failed to persist final task state");
        }

        if success {
            match self.store.save_history(task) {
                Ok(()) => info!(task_id = %task.id, "Task completed and archived"),
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "Failed to archive completed task")
                }
            }
        } else {
            info!(
                task_id = %task.id,
                error = task.error_message.as_deref().unwrap_or(""),
                "Task failed"
            );
        }
    }

    /// Current state of a task: the live record first, then history.
    pub fn status(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        if let Some(task) = self.store.get(task_id)? {
            return Ok(task);
        }
        self.store
            .get_history(task_id)?
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))
    }

    pub fn list(&self) -> Result<Vec<Task>, OrchestratorError> {
        Ok(self.store.list()?)
    }

    pub fn history(&self) -> Result<Vec<Task>, OrchestratorError> {
        Ok(self.store.list_history()?)
    }

    /// Remove a live task. Running tasks cannot be deleted.
    pub fn delete(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        // Held across the removal so no execution can claim the id meanwhile.
        let in_flight = lock_set(&self.in_flight);
        if in_flight.contains(task_id) {
            return Err(OrchestratorError::AlreadyRunning(task_id.to_string()));
        }

        let task = self.store.remove(task_id).map_err(|e| match e {
            TaskStoreError::NotFound(id) => OrchestratorError::TaskNotFound(id),
            other => OrchestratorError::Store(other),
        })?;
        info!(task_id, "Task deleted");
        Ok(task)
    }

    /// Fail tasks left `Downloading` by a previous process.
    ///
    /// Returns how many were recovered.
    pub fn recover_interrupted(&self) -> Result<usize, OrchestratorError> {
        let in_flight = lock_set(&self.in_flight);
        let mut recovered = 0;
        for mut task in self.store.list()? {
            if task.status != TaskStatus::Downloading || in_flight.contains(&task.id) {
                continue;
            }
            if task.fail(INTERRUPTED_MESSAGE).is_ok() && self.store.update(&task)? {
                warn!(task_id = %task.id, "Recovered interrupted task");
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}
