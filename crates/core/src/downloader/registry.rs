use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{apply, Downloader, ProgressSink};
use crate::task::{Source, Task};

/// Maps each source to its downloader. Built once at startup.
#[derive(Clone, Default)]
pub struct DownloaderRegistry {
    downloaders: HashMap<Source, Arc<dyn Downloader>>,
}

impl DownloaderRegistry {
    /// Build a registry. A later downloader for the same source replaces an
    /// earlier one.
    pub fn new(downloaders: Vec<Arc<dyn Downloader>>) -> Self {
        let downloaders = downloaders
            .into_iter()
            .map(|d| (d.source(), d))
            .collect();
        Self { downloaders }
    }

    pub fn get(&self, source: Source) -> Option<Arc<dyn Downloader>> {
        self.downloaders.get(&source).cloned()
    }

    /// Registered sources, in wire-name order.
    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.downloaders.keys().copied().collect();
        sources.sort_by_key(|s| s.as_str());
        sources
    }

    /// Route `task` to the downloader for its source.
    ///
    /// An unregistered source fails the task immediately, keeping its
    /// progress, with no retry.
    pub async fn dispatch(&self, task: &mut Task, progress: &dyn ProgressSink) -> bool {
        let Some(downloader) = self.get(task.source) else {
            warn!(task_id = %task.id, source = %task.source, "No downloader registered");
            let id = task.id.clone();
            let message = format!("unsupported download source: {}", task.source);
            apply(&id, task.fail(message));
            return false;
        };

        debug!(task_id = %task.id, source = %task.source, "Dispatching download");
        downloader.download(task, progress).await
    }
}

impl std::fmt::Debug for DownloaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloaderRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}
