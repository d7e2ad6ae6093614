//! Orchestrator lifecycle integration tests.
//!
//! These tests drive tasks through the orchestrator backed by the SQLite
//! store: pending -> downloading -> completed (archived) or failed (kept).

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opused_core::config::{OrchestratorConfig, TorrentIndexConfig};
use opused_core::testing::{fixtures, MockDownloader, MockMetadataResolver};
use opused_core::{
    BatchRequest, DownloadMode, Downloader, DownloaderRegistry, ExecutionMode, OrchestratorError,
    Source, SqliteTaskStore, TaskOrchestrator, TaskSpec, TaskStatus, TaskStore,
    TorrentIndexDownloader,
};

/// Test helper holding every dependency of the orchestrator.
struct TestHarness {
    store: Arc<SqliteTaskStore>,
    video: Arc<MockDownloader>,
    resolver: Arc<MockMetadataResolver>,
    server: MockServer,
    temp_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteTaskStore::new(&temp_dir.path().join("opused.db"))
                .expect("Failed to create task store"),
        );

        Self {
            store,
            video: Arc::new(MockDownloader::new(Source::VideoHost)),
            resolver: Arc::new(MockMetadataResolver::new()),
            server: MockServer::start().await,
            temp_dir,
        }
    }

    fn create_orchestrator(&self, mode: ExecutionMode) -> TaskOrchestrator {
        let torrent = TorrentIndexDownloader::new(&TorrentIndexConfig {
            base_url: self.server.uri(),
            timeout_secs: 5,
        })
        .expect("Failed to create torrent index downloader");

        let registry = DownloaderRegistry::new(vec![
            self.video.clone() as Arc<dyn Downloader>,
            Arc::new(torrent),
        ]);

        TaskOrchestrator::new(
            OrchestratorConfig {
                mode,
                max_concurrent_downloads: 2,
            },
            self.store.clone(),
            Arc::new(registry),
            self.resolver.clone(),
        )
    }

    fn target_dir(&self) -> String {
        self.temp_dir.path().join("music").to_string_lossy().into_owned()
    }
}

async fn wait_for_terminal(orchestrator: &TaskOrchestrator, task_id: &str) -> TaskStatus {
    for _ in 0..200 {
        let status = orchestrator.status(task_id).unwrap().status;
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} did not finish", task_id);
}

#[tokio::test]
async fn test_batch_then_background_start() {
    let h = TestHarness::new().await;
    let orchestrator = h.create_orchestrator(ExecutionMode::Background);
    h.resolver.set_results(
        "Lycoris Recoil",
        vec![
            fixtures::metadata("Lycoris Recoil", "ALIVE"),
            fixtures::metadata("Lycoris Recoil", "花の塔"),
        ],
    );

    let tasks = orchestrator
        .create_batch(BatchRequest {
            titles: vec!["Lycoris Recoil".to_string()],
            target_dir: h.target_dir(),
            source: Source::VideoHost,
            dmhy_mode: DownloadMode::Video,
            token: None,
        })
        .await
        .unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(h.store.list().unwrap().len(), 2);

    for task in &tasks {
        let snapshot = orchestrator.start(&task.id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Pending);
    }
    for task in &tasks {
        assert_eq!(
            wait_for_terminal(&orchestrator, &task.id).await,
            TaskStatus::Completed
        );
    }

    assert!(h.store.list().unwrap().is_empty());
    let history = orchestrator.history().unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|t| t.progress == 100.0));
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let h = TestHarness::new().await;
    let orchestrator = h.create_orchestrator(ExecutionMode::Inline);

    let outcome = orchestrator
        .submit(TaskSpec::new("Lycoris Recoil", h.target_dir(), Source::VideoHost)
            .with_metadata(fixtures::metadata("Lycoris Recoil", "ALIVE")))
        .await
        .unwrap();
    let task_id = outcome.task().id.clone();

    let reopened = SqliteTaskStore::new(&h.temp_dir.path().join("opused.db")).unwrap();
    let archived = reopened.get_history(&task_id).unwrap().unwrap();
    assert_eq!(archived.status, TaskStatus::Completed);
    assert_eq!(archived.metadata.unwrap().song_title, "ALIVE");
    assert!(reopened.get(&task_id).unwrap().is_none());
}

#[tokio::test]
async fn test_torrent_index_video_mode_ends_failed() {
    let h = TestHarness::new().await;
    let orchestrator = h.create_orchestrator(ExecutionMode::Inline);

    Mock::given(method("GET"))
        .and(path("/topics/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table id="topic_list"><tbody><tr><td class="title">
                <a href="/topics/view/1_x.html">x</a></td></tr></tbody></table>"#,
        ))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/topics/view/1_x.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<p id="magnet">magnet:?xt=urn:btih:FEED</p>"#,
        ))
        .mount(&h.server)
        .await;

    let spec = TaskSpec::new("Lycoris Recoil", h.target_dir(), Source::TorrentIndex)
        .with_metadata(fixtures::metadata("Lycoris Recoil", "ALIVE"));
    let outcome = orchestrator.submit(spec).await.unwrap();
    let task = outcome.task();

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error_message.as_deref().unwrap().starts_with("dmhy:"));

    let stored = h.store.get(&task.id).unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.progress, 50.0);
    let magnet = std::fs::read_to_string(h.temp_dir.path().join("music/magnet.txt")).unwrap();
    assert_eq!(magnet, "magnet:?xt=urn:btih:FEED");
}

#[tokio::test]
async fn test_caller_supplied_id_and_duplicate() {
    let h = TestHarness::new().await;
    let orchestrator = h.create_orchestrator(ExecutionMode::Background);

    let mut spec = TaskSpec::new("Frieren", h.target_dir(), Source::VideoHost);
    spec.id = Some("renderer-42".to_string());
    let task = orchestrator.create_task(spec.clone()).unwrap();
    assert_eq!(task.id, "renderer-42");

    let err = orchestrator.create_task(spec).unwrap_err();
    assert!(matches!(err, OrchestratorError::Store(_)));

    let deleted = orchestrator.delete("renderer-42").unwrap();
    assert_eq!(deleted.id, "renderer-42");
    assert!(matches!(
        orchestrator.status("renderer-42"),
        Err(OrchestratorError::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn test_task_without_metadata_fails_fast() {
    let h = TestHarness::new().await;
    let orchestrator = h.create_orchestrator(ExecutionMode::Inline);

    let outcome = orchestrator
        .submit(TaskSpec::new("Frieren", h.target_dir(), Source::TorrentIndex))
        .await
        .unwrap();

    assert_eq!(outcome.task().status, TaskStatus::Failed);
    assert_eq!(outcome.task().progress, 0.0);
    assert!(h.server.received_requests().await.unwrap_or_default().is_empty());
}

#[test]
fn test_search_metadata_passes_token() {
    let resolver = Arc::new(MockMetadataResolver::new());
    resolver.set_results("Frieren", vec![fixtures::metadata("Frieren", "勇者")]);
    let orchestrator = TaskOrchestrator::new(
        OrchestratorConfig::default(),
        Arc::new(opused_core::MemoryTaskStore::new()),
        Arc::new(DownloaderRegistry::default()),
        resolver.clone(),
    );

    let results = tokio_test::block_on(orchestrator.search_metadata(" Frieren ", Some("token-1")))
        .unwrap();

    assert_eq!(results.len(), 1);
    let lookups = resolver.recorded_lookups();
    assert_eq!(lookups[0].anime_title, "Frieren");
    assert_eq!(lookups[0].token.as_deref(), Some("token-1"));
}
