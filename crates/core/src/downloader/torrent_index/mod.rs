//! Torrent-index downloader for share.dmhy.org.
//!
//! Search the topic list, open the first topic and either save its
//! `.torrent` file or, in video mode, record the magnet link and fail: no
//! peer-to-peer transfer is performed here.

mod parser;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};
use tracing::{debug, info, warn};

use super::{apply, fail_without_metadata, DownloadError, Downloader, ProgressSink};
use crate::config::TorrentIndexConfig;
use crate::task::{DownloadMode, Source, Task};

use parser::{detail_links, first_topic_link, normalize_link, torrent_filename};

/// File the magnet link is written to in video mode.
pub const MAGNET_FILE: &str = "magnet.txt";

const MAX_REDIRECTS: usize = 10;

const PROGRESS_SEARCHING: f64 = 10.0;
const PROGRESS_DETAIL_PARSED: f64 = 50.0;

/// Result of a run that did not hit a fault.
enum Outcome {
    Saved(PathBuf),
    MagnetRecorded(PathBuf),
}

pub struct TorrentIndexDownloader {
    client: Client,
    base_url: String,
}

impl TorrentIndexDownloader {
    pub fn new(config: &TorrentIndexConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn run(
        &self,
        task: &mut Task,
        query: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Outcome, DownloadError> {
        let search_url = format!(
            "{}/topics/list?keyword={}",
            self.base_url,
            urlencoding::encode(query)
        );
        debug!(task_id = %task.id, url = %search_url, "Searching torrent index");
        let search_page = self.get(&search_url).await?.text().await?;

        let href = first_topic_link(&search_page)?
            .ok_or_else(|| DownloadError::NoMatch(query.to_string()))?;
        let detail_url = normalize_link(&self.base_url, &href);

        debug!(task_id = %task.id, url = %detail_url, "Fetching topic detail");
        let detail_page = self.get(&detail_url).await?.text().await?;
        let links = detail_links(&detail_page)?;

        let id = task.id.clone();
        apply(&id, task.report_progress(PROGRESS_DETAIL_PARSED));
        progress.publish(task);

        let target_dir = Path::new(&task.target_dir);
        match task.dmhy_mode {
            DownloadMode::TorrentFile => {
                let href = links.torrent.ok_or(DownloadError::NoTorrentLink)?;
                let torrent_url = normalize_link(&self.base_url, &href);
                let bytes = self.get(&torrent_url).await?.bytes().await?;

                tokio::fs::create_dir_all(target_dir).await?;
                let path = target_dir.join(torrent_filename(&torrent_url));
                tokio::fs::write(&path, &bytes).await?;
                Ok(Outcome::Saved(path))
            }
            DownloadMode::Video => {
                let magnet = links.magnet.ok_or(DownloadError::NoMagnetLink)?;
                tokio::fs::create_dir_all(target_dir).await?;
                let path = target_dir.join(MAGNET_FILE);
                tokio::fs::write(&path, magnet.as_bytes()).await?;
                Ok(Outcome::MagnetRecorded(path))
            }
        }
    }
}

/// Search query for a task: custom keywords win, otherwise
/// `"{anime} {song}"`.
fn search_query(task: &Task) -> Option<String> {
    if let Some(keywords) = task.keyword_override() {
        return Some(keywords.to_string());
    }
    task.searchable_metadata()
        .map(|m| format!("{} {}", m.anime_title, m.song_title).trim().to_string())
}

#[async_trait]
impl Downloader for TorrentIndexDownloader {
    fn source(&self) -> Source {
        Source::TorrentIndex
    }

    async fn download(&self, task: &mut Task, progress: &dyn ProgressSink) -> bool {
        if fail_without_metadata(task) {
            progress.publish(task);
            return false;
        }
        let id = task.id.clone();
        let Some(query) = search_query(task) else {
            apply(&id, task.fail("dmhy: empty search query"));
            progress.publish(task);
            return false;
        };

        apply(&id, task.start(PROGRESS_SEARCHING));
        progress.publish(task);
        info!(task_id = %id, query = %query, mode = task.dmhy_mode.as_str(), "Starting torrent index download");

        let succeeded = match self.run(task, &query, progress).await {
            Ok(Outcome::Saved(path)) => {
                info!(task_id = %id, path = %path.display(), "Torrent file saved");
                apply(&id, task.complete());
                true
            }
            Ok(Outcome::MagnetRecorded(path)) => {
                info!(task_id = %id, path = %path.display(), "Magnet link recorded");
                let message = format!(
                    "dmhy: video mode cannot transfer torrents; magnet link saved to {}. \
                     Switch to torrent mode to download the .torrent file",
                    MAGNET_FILE
                );
                apply(&id, task.fail(message));
                false
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "Torrent index download failed");
                apply(&id, task.fail(format!("dmhy: {}", e)));
                false
            }
        };

        progress.publish(task);
        succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query() {
        let task = Task::new("Frieren", "/tmp/x", Source::TorrentIndex, DownloadMode::Video)
            .with_metadata(crate::task::Metadata::new("Frieren", "勇者", "YOASOBI", "OP"));
        assert_eq!(search_query(&task).unwrap(), "Frieren 勇者");

        let task = task.with_custom_keywords("葬送 OP");
        assert_eq!(search_query(&task).unwrap(), "葬送 OP");
    }

    #[test]
    fn test_new_accepts_default_config() {
        let downloader = TorrentIndexDownloader::new(&TorrentIndexConfig::default()).unwrap();
        assert_eq!(downloader.base_url, "https://share.dmhy.org");
        assert_eq!(downloader.source(), Source::TorrentIndex);
    }
}
