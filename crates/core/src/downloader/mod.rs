//! Download backends and their dispatch.
//!
//! Each [`Source`] has exactly one [`Downloader`]. A downloader owns the task
//! for the duration of a run: it moves it through the lifecycle, publishes
//! intermediate snapshots through a [`ProgressSink`] and reports whether the
//! run ended in `Completed`. Faults never escape as errors; they end up in the
//! task's `Failed` status and error message.

mod registry;
mod torrent_index;
mod video_host;

pub use registry::DownloaderRegistry;
pub use torrent_index::{TorrentIndexDownloader, MAGNET_FILE};
pub use video_host::{
    EngineError, EngineEvent, EngineRequest, VideoEngine, VideoHostDownloader, YtDlpEngine,
};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::task::{InvalidTransition, Source, Task};

/// Message for tasks that cannot be searched for.
pub const MISSING_METADATA_MESSAGE: &str = "missing metadata: a song title is required";

/// A download backend for one source.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// The source this downloader serves.
    fn source(&self) -> Source;

    /// Run the download for `task`, returning `true` iff it ends `Completed`.
    async fn download(&self, task: &mut Task, progress: &dyn ProgressSink) -> bool;
}

/// Receives task snapshots while a download is running.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, task: &Task);
}

/// Sink that drops every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn publish(&self, _task: &Task) {}
}

/// Errors raised inside a download run before being folded into the task.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to parse page: {0}")]
    Parse(String),

    #[error("no match for {0:?}")]
    NoMatch(String),

    #[error("no magnet link on detail page")]
    NoMagnetLink,

    #[error("no torrent link on detail page")]
    NoTorrentLink,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Apply a status change, logging instead of propagating a rejected one.
pub(crate) fn apply(task_id: &str, result: Result<(), InvalidTransition>) {
    if let Err(e) = result {
        warn!(task_id, error = %e, "Status change rejected");
    }
}

/// Fail the task without any I/O when it has nothing to search for.
///
/// Returns `true` when the task was failed.
pub(crate) fn fail_without_metadata(task: &mut Task) -> bool {
    if task.searchable_metadata().is_some() {
        return false;
    }
    warn!(task_id = %task.id, "Task has no usable metadata");
    let id = task.id.clone();
    apply(&id, task.fail(MISSING_METADATA_MESSAGE));
    true
}
