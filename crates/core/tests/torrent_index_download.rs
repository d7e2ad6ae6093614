//! Torrent index downloader tests against a mocked share.dmhy.org.

use std::path::Path;

use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opused_core::config::TorrentIndexConfig;
use opused_core::downloader::{NoopProgress, MAGNET_FILE, MISSING_METADATA_MESSAGE};
use opused_core::{
    DownloadMode, Downloader, Metadata, Source, Task, TaskStatus, TorrentIndexDownloader,
};

const MAGNET: &str = "magnet:?xt=urn:btih:0123456789ABCDEF";

fn search_page(detail_href: &str) -> String {
    format!(
        r#"<html><body><table id="topic_list"><tbody>
            <tr>
              <td>2024/01/01</td>
              <td class="title">
                <span class="tag"><a href="/topics/list/team_id/1">字幕組</a></span>
                <a href="{}">[ClariS] ALIVE [FLAC]</a>
              </td>
            </tr>
        </tbody></table></body></html>"#,
        detail_href
    )
}

fn detail_page(torrent_href: Option<&str>) -> String {
    let torrent = torrent_href
        .map(|href| format!(r#"<a href="{}">[ClariS] ALIVE.torrent</a>"#, href))
        .unwrap_or_default();
    format!(
        r#"<html><body>
            <div id="tabs-1">{}</div>
            <a class="magnet" id="a_magnet" href="{magnet}">{magnet}</a>
        </body></html>"#,
        torrent,
        magnet = MAGNET
    )
}

fn downloader(server: &MockServer) -> TorrentIndexDownloader {
    TorrentIndexDownloader::new(&TorrentIndexConfig {
        base_url: server.uri(),
        timeout_secs: 5,
    })
    .unwrap()
}

fn task(dir: &Path, mode: DownloadMode) -> Task {
    Task::new(
        "Lycoris Recoil",
        dir.join("out").to_string_lossy(),
        Source::TorrentIndex,
        mode,
    )
    .with_metadata(Metadata::new("Lycoris Recoil", "ALIVE", "ClariS", "OP"))
}

async fn mount_search_and_detail(server: &MockServer, torrent_href: Option<String>) {
    Mock::given(method("GET"))
        .and(path("/topics/list"))
        .and(query_param("keyword", "Lycoris Recoil ALIVE"))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page("/topics/view/654321_ALIVE.html")))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/topics/view/654321_ALIVE.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(torrent_href.as_deref())))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_torrent_file_mode_saves_torrent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let torrent_url = format!("{}/dl/2024/%5BClariS%5D%20ALIVE.torrent", server.uri());
    mount_search_and_detail(&server, Some(torrent_url)).await;

    Mock::given(method("GET"))
        .and(path("/dl/2024/%5BClariS%5D%20ALIVE.torrent"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"d8:announce0:e".to_vec()))
        .mount(&server)
        .await;

    let mut task = task(dir.path(), DownloadMode::TorrentFile);
    let ok = downloader(&server).download(&mut task, &NoopProgress).await;

    assert!(ok, "error: {:?}", task.error_message);
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100.0);
    let saved = dir.path().join("out").join("[ClariS] ALIVE.torrent");
    assert_eq!(std::fs::read(saved).unwrap(), b"d8:announce0:e");
}

#[tokio::test]
async fn test_video_mode_records_magnet_and_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_search_and_detail(&server, None).await;

    let mut task = task(dir.path(), DownloadMode::Video);
    let ok = downloader(&server).download(&mut task, &NoopProgress).await;

    assert!(!ok);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.progress, 50.0);
    let message = task.error_message.unwrap();
    assert!(message.starts_with("dmhy:"));
    assert!(message.contains("torrent mode"));

    let magnet = std::fs::read_to_string(dir.path().join("out").join(MAGNET_FILE)).unwrap();
    assert_eq!(magnet, MAGNET);
}

#[tokio::test]
async fn test_torrent_mode_without_torrent_link_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_search_and_detail(&server, None).await;

    let mut task = task(dir.path(), DownloadMode::TorrentFile);
    assert!(!downloader(&server).download(&mut task, &NoopProgress).await);

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(
        task.error_message.as_deref(),
        Some("dmhy: no torrent link on detail page")
    );
}

#[tokio::test]
async fn test_empty_search_fails_with_no_match() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/topics/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table id="topic_list"><tbody></tbody></table>"#,
        ))
        .mount(&server)
        .await;

    let mut task = task(dir.path(), DownloadMode::TorrentFile);
    assert!(!downloader(&server).download(&mut task, &NoopProgress).await);

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.progress, 10.0);
    let message = task.error_message.unwrap();
    assert!(message.starts_with("dmhy: no match"), "{}", message);
}

#[tokio::test]
async fn test_custom_keywords_override_query() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/topics/list"))
        .and(query_param("keyword", "ClariS ALIVE 320k"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table id="topic_list"><tbody></tbody></table>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut task = task(dir.path(), DownloadMode::Video).with_custom_keywords("ClariS ALIVE 320k");
    assert!(!downloader(&server).download(&mut task, &NoopProgress).await);
}

#[tokio::test]
async fn test_upstream_error_status_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/topics/list"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut task = task(dir.path(), DownloadMode::Video);
    assert!(!downloader(&server).download(&mut task, &NoopProgress).await);

    let message = task.error_message.unwrap();
    assert!(message.starts_with("dmhy:"));
    assert!(message.contains("502"));
}

#[tokio::test]
async fn test_missing_metadata_makes_no_requests() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut task = Task::new(
        "Lycoris Recoil",
        dir.path().to_string_lossy(),
        Source::TorrentIndex,
        DownloadMode::TorrentFile,
    );
    assert!(!downloader(&server).download(&mut task, &NoopProgress).await);

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some(MISSING_METADATA_MESSAGE));
    assert_eq!(task.progress, 0.0);
}
