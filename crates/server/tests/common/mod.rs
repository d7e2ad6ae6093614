//! Common test utilities for API testing with mocks.
//!
//! Builds an in-process router over a memory task store with mock
//! downloaders and a mock metadata resolver, so no yt-dlp binary or
//! network access is needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use opused_core::testing::{MockDownloader, MockMetadataResolver};
use opused_core::{
    Config, Downloader, DownloaderRegistry, ExecutionMode, MemoryTaskStore, OrchestratorConfig,
    Source, TaskOrchestrator,
};

/// Re-export fixtures for test convenience
pub use opused_core::testing::fixtures;

/// Test fixture with controllable mocks for:
/// - yt-dlp downloads (`video`)
/// - dmhy downloads (`torrent`)
/// - Bangumi lookups (`resolver`)
pub struct TestFixture {
    pub router: Router,
    pub video: Arc<MockDownloader>,
    pub torrent: Arc<MockDownloader>,
    pub resolver: Arc<MockMetadataResolver>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture that runs tasks to completion before answering.
    pub fn inline() -> Self {
        Self::with_mode(ExecutionMode::Inline)
    }

    /// Fixture that answers immediately and downloads in the background.
    pub fn background() -> Self {
        Self::with_mode(ExecutionMode::Background)
    }

    pub fn with_mode(mode: ExecutionMode) -> Self {
        let video = Arc::new(MockDownloader::new(Source::VideoHost));
        let torrent = Arc::new(MockDownloader::new(Source::TorrentIndex));
        let resolver = Arc::new(MockMetadataResolver::new());

        let orchestrator_config = OrchestratorConfig {
            mode,
            ..Default::default()
        };
        let mut config = Config::default();
        config.orchestrator = orchestrator_config.clone();

        let registry = DownloaderRegistry::new(vec![
            Arc::clone(&video) as Arc<dyn Downloader>,
            Arc::clone(&torrent) as Arc<dyn Downloader>,
        ]);
        let orchestrator = TaskOrchestrator::new(
            orchestrator_config,
            Arc::new(MemoryTaskStore::new()),
            Arc::new(registry),
            Arc::clone(&resolver) as Arc<dyn opused_core::MetadataResolver>,
        );

        let state = Arc::new(opused_server::state::AppState::new(config, orchestrator));
        let router = opused_server::api::create_router(state);

        Self {
            router,
            video,
            torrent,
            resolver,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Poll a task until it reaches `status` or the attempts run out.
    pub async fn wait_for_status(&self, task_id: &str, status: &str, max_attempts: u32) -> bool {
        for _ in 0..max_attempts {
            let response = self.get(&format!("/api/v1/tasks/{}", task_id)).await;
            if response.body["status"] == status {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
