//! Video-host downloader: search the video site and fetch the first hit.

mod engine;
mod ytdlp;

pub use engine::{EngineError, EngineEvent, EngineRequest, VideoEngine};
pub use ytdlp::YtDlpEngine;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{apply, fail_without_metadata, Downloader, ProgressSink};
use crate::config::VideoHostConfig;
use crate::task::{Source, Task};

/// Output file name template, relative to the target directory.
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

pub struct VideoHostDownloader {
    engine: Arc<dyn VideoEngine>,
    format: String,
}

impl VideoHostDownloader {
    pub fn new(engine: Arc<dyn VideoEngine>, config: &VideoHostConfig) -> Self {
        Self {
            engine,
            format: config.format.clone(),
        }
    }

    fn fail(task: &mut Task, message: String, progress: &dyn ProgressSink) -> bool {
        warn!(task_id = %task.id, error = %message, "Video download failed");
        let id = task.id.clone();
        apply(&id, task.fail(message));
        progress.publish(task);
        false
    }
}

/// Search query for a task: custom keywords win, otherwise
/// `"{anime} {song} {type}"`.
fn search_query(task: &Task) -> Option<String> {
    if let Some(keywords) = task.keyword_override() {
        return Some(keywords.to_string());
    }
    task.searchable_metadata().map(|m| {
        format!("{} {} {}", m.anime_title, m.song_title, m.song_type)
            .trim()
            .to_string()
    })
}

/// Percent complete rounded to one decimal, when the total is known.
fn percent(downloaded: u64, total: Option<u64>) -> Option<f64> {
    let total = total.filter(|t| *t > 0)?;
    let raw = downloaded as f64 / total as f64 * 100.0;
    Some((raw * 10.0).round() / 10.0)
}

fn on_event(task: &mut Task, event: EngineEvent, progress: &dyn ProgressSink) {
    match event {
        EngineEvent::Progress { downloaded, total } => {
            if let Some(pct) = percent(downloaded, total) {
                let id = task.id.clone();
                apply(&id, task.report_progress(pct));
                progress.publish(task);
            }
        }
        EngineEvent::Error(message) => {
            warn!(task_id = %task.id, error = %message, "Video engine reported an error");
        }
    }
}

#[async_trait]
impl Downloader for VideoHostDownloader {
    fn source(&self) -> Source {
        Source::VideoHost
    }

    async fn download(&self, task: &mut Task, progress: &dyn ProgressSink) -> bool {
        if fail_without_metadata(task) {
            progress.publish(task);
            return false;
        }
        let Some(query) = search_query(task) else {
            return Self::fail(task, "empty search query".to_string(), progress);
        };

        if let Err(e) = tokio::fs::create_dir_all(&task.target_dir).await {
            let message = format!("failed to create directory {}: {}", task.target_dir, e);
            return Self::fail(task, message, progress);
        }

        let id = task.id.clone();
        apply(&id, task.start(0.0));
        progress.publish(task);
        info!(task_id = %id, query = %query, "Starting video download");

        let request = EngineRequest {
            target: format!("ytsearch1:{}", query),
            output_template: Path::new(&task.target_dir)
                .join(OUTPUT_TEMPLATE)
                .to_string_lossy()
                .into_owned(),
            format: self.format.clone(),
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = Arc::clone(&self.engine);
        let mut handle = tokio::task::spawn_blocking(move || engine.fetch(&request, &tx));

        // The engine returning ends the run even if a detached reader still
        // holds a sender.
        let joined = loop {
            tokio::select! {
                biased;
                Some(event) = rx.recv() => on_event(task, event, progress),
                joined = &mut handle => break joined,
            }
        };
        while let Ok(event) = rx.try_recv() {
            on_event(task, event, progress);
        }

        match joined {
            Ok(Ok(())) => {
                apply(&id, task.complete());
                progress.publish(task);
                info!(task_id = %id, "Video download completed");
                true
            }
            Ok(Err(e)) => Self::fail(task, e.to_string(), progress),
            Err(e) => {
                debug!(task_id = %id, error = %e, "Video engine task aborted");
                Self::fail(task, format!("video engine crashed: {}", e), progress)
            }
        }
    }
}
