//! Core task data types.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Enumerations
// ============================================================================

/// Download backend a task is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Video search-and-fetch engine (yt-dlp).
    #[serde(rename = "youtube")]
    VideoHost,
    /// Torrent index scrape-and-fetch (share.dmhy.org).
    #[serde(rename = "dmhy")]
    TorrentIndex,
}

impl Source {
    /// Wire identifier of the source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::VideoHost => "youtube",
            Source::TorrentIndex => "dmhy",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(Source::VideoHost),
            "dmhy" => Ok(Source::TorrentIndex),
            other => Err(format!("unknown source: {}", other)),
        }
    }
}

/// What the torrent-index backend should fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownloadMode {
    /// Fetch the media itself (not supported by the torrent-index backend).
    #[default]
    #[serde(rename = "video")]
    Video,
    /// Fetch only the .torrent file.
    #[serde(rename = "torrent")]
    TorrentFile,
}

impl DownloadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadMode::Video => "video",
            DownloadMode::TorrentFile => "torrent",
        }
    }
}

impl std::str::FromStr for DownloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(DownloadMode::Video),
            "torrent" => Ok(DownloadMode::TorrentFile),
            other => Err(format!("unknown download mode: {}", other)),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet dispatched.
    #[default]
    Pending,
    /// A downloader is working on it.
    Downloading,
    /// Finished successfully (terminal).
    Completed,
    /// Finished with an error (terminal).
    Failed,
}

impl TaskStatus {
    /// Returns true if no further transitions are possible within this attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether moving from `self` to `next` is allowed within one attempt.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Pending, _) => true,
            (TaskStatus::Downloading, TaskStatus::Pending) => false,
            (TaskStatus::Downloading, _) => true,
            (TaskStatus::Completed, _) | (TaskStatus::Failed, _) => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "downloading" => Ok(TaskStatus::Downloading),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// A resolved (anime, song, artist, type) tuple used to build search queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub anime_title: String,
    pub song_title: String,
    pub artist: String,
    /// Song kind, e.g. "OP", "ED".
    #[serde(rename = "type")]
    pub song_type: String,
    /// Bangumi subject id of the entry this was resolved from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bangumi_id: Option<String>,
}

impl Metadata {
    pub fn new(
        anime_title: impl Into<String>,
        song_title: impl Into<String>,
        artist: impl Into<String>,
        song_type: impl Into<String>,
    ) -> Self {
        Self {
            anime_title: anime_title.into(),
            song_title: song_title.into(),
            artist: artist.into(),
            song_type: song_type.into(),
            bangumi_id: None,
        }
    }

    pub fn with_bangumi_id(mut self, id: impl Into<String>) -> Self {
        self.bangumi_id = Some(id.into());
        self
    }
}

// ============================================================================
// Task
// ============================================================================

/// Error returned when a status change would break the lifecycle ordering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition for task {task_id}: {from} -> {to}")]
pub struct InvalidTransition {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Message used when a task is failed without an explicit reason.
const UNSPECIFIED_FAILURE: &str = "download failed";

/// The unit of work tracking one song's download attempt end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub anime_title: String,
    pub target_dir: String,
    pub source: Source,
    #[serde(default)]
    pub dmhy_mode: DownloadMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Operator-supplied search string replacing the generated query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_keywords: Option<String>,
    pub status: TaskStatus,
    pub progress: f64,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task with a generated id.
    pub fn new(
        anime_title: impl Into<String>,
        target_dir: impl Into<String>,
        source: Source,
        dmhy_mode: DownloadMode,
    ) -> Self {
        Self::with_id(
            uuid::Uuid::new_v4().to_string(),
            anime_title,
            target_dir,
            source,
            dmhy_mode,
        )
    }

    /// Create a pending task with a caller-supplied id.
    pub fn with_id(
        id: impl Into<String>,
        anime_title: impl Into<String>,
        target_dir: impl Into<String>,
        source: Source,
        dmhy_mode: DownloadMode,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            anime_title: anime_title.into(),
            target_dir: target_dir.into(),
            source,
            dmhy_mode,
            metadata: None,
            custom_keywords: None,
            status: TaskStatus::Pending,
            progress: 0.0,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_custom_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.custom_keywords = Some(keywords.into());
        self
    }

    /// Metadata usable for building a search query, if any.
    ///
    /// Returns `None` when metadata is missing or its song title is blank.
    pub fn searchable_metadata(&self) -> Option<&Metadata> {
        self.metadata
            .as_ref()
            .filter(|m| !m.song_title.trim().is_empty())
    }

    /// Non-blank custom keywords, if the operator supplied any.
    pub fn keyword_override(&self) -> Option<&str> {
        self.custom_keywords
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// The single mutation primitive.
    ///
    /// Progress is clamped to `[0, 100]`, the error message is kept only for
    /// `Failed` (a generic one is filled in when missing) and `updated_at`
    /// always moves forward. Transitions out of a terminal state are rejected
    /// and leave the task untouched.
    pub fn set_status(
        &mut self,
        status: TaskStatus,
        progress: f64,
        error: Option<String>,
    ) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(status) {
            return Err(InvalidTransition {
                task_id: self.id.clone(),
                from: self.status,
                to: status,
            });
        }

        self.status = status;
        self.progress = clamp_progress(progress);
        self.error_message = match status {
            TaskStatus::Failed => {
                Some(error.unwrap_or_else(|| UNSPECIFIED_FAILURE.to_string()))
            }
            _ => None,
        };
        self.touch();
        Ok(())
    }

    /// Move to `Downloading` at the given progress.
    pub fn start(&mut self, progress: f64) -> Result<(), InvalidTransition> {
        self.set_status(TaskStatus::Downloading, progress, None)
    }

    /// Update progress while downloading.
    pub fn report_progress(&mut self, progress: f64) -> Result<(), InvalidTransition> {
        self.set_status(TaskStatus::Downloading, progress, None)
    }

    /// Finish successfully at 100%.
    pub fn complete(&mut self) -> Result<(), InvalidTransition> {
        self.set_status(TaskStatus::Completed, 100.0, None)
    }

    /// Finish with an error, keeping the current progress.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), InvalidTransition> {
        let progress = self.progress;
        self.set_status(TaskStatus::Failed, progress, Some(message.into()))
    }

    /// Begin a fresh execution attempt.
    pub fn reset_for_retry(&mut self) {
        self.status = TaskStatus::Pending;
        self.progress = 0.0;
        self.error_message = None;
        self.touch();
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::nanoseconds(1)
        };
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}
