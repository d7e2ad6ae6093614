//! Types for the task orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::MetadataError;
use crate::task::{DownloadMode, Metadata, Source, Task, TaskStoreError};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The request is missing required fields.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Task not found in the active store or history.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The task is already being executed.
    #[error("task is already running: {0}")]
    AlreadyRunning(String),

    /// Task store error.
    #[error("task store error: {0}")]
    Store(#[from] TaskStoreError),

    /// Metadata resolution error.
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

fn default_source() -> Source {
    Source::VideoHost
}

/// Caller-supplied description of a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Reuse a caller-side id instead of generating one.
    #[serde(default)]
    pub id: Option<String>,
    pub anime_title: String,
    pub target_dir: String,
    #[serde(default = "default_source")]
    pub source: Source,
    #[serde(default)]
    pub dmhy_mode: DownloadMode,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub custom_keywords: Option<String>,
}

impl TaskSpec {
    pub fn new(anime_title: impl Into<String>, target_dir: impl Into<String>, source: Source) -> Self {
        Self {
            id: None,
            anime_title: anime_title.into(),
            target_dir: target_dir.into(),
            source,
            dmhy_mode: DownloadMode::default(),
            metadata: None,
            custom_keywords: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Build a pending task, rejecting blank titles, directories and ids.
    pub fn into_task(self) -> Result<Task, OrchestratorError> {
        if self.anime_title.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "anime_title cannot be empty".to_string(),
            ));
        }
        if self.target_dir.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "target_dir cannot be empty".to_string(),
            ));
        }

        let mut task = match self.id {
            Some(id) if id.trim().is_empty() => {
                return Err(OrchestratorError::InvalidRequest(
                    "id cannot be blank".to_string(),
                ))
            }
            Some(id) => Task::with_id(id, self.anime_title, self.target_dir, self.source, self.dmhy_mode),
            None => Task::new(self.anime_title, self.target_dir, self.source, self.dmhy_mode),
        };
        task.metadata = self.metadata;
        task.custom_keywords = self.custom_keywords;
        Ok(task)
    }
}

/// Create one task per resolved song for each title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub titles: Vec<String>,
    pub target_dir: String,
    #[serde(default = "default_source")]
    pub source: Source,
    #[serde(default)]
    pub dmhy_mode: DownloadMode,
    /// Bangumi access token forwarded to the resolver.
    #[serde(default)]
    pub token: Option<String>,
}

/// What `submit` did with a task.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Queued for background execution; the task is a snapshot at dispatch.
    Accepted(Task),
    /// Executed to a terminal status before returning.
    Finished { task: Task, success: bool },
}

impl SubmitOutcome {
    pub fn task(&self) -> &Task {
        match self {
            SubmitOutcome::Accepted(task) => task,
            SubmitOutcome::Finished { task, .. } => task,
        }
    }
}
