use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opused_core::{
    load_config, validate_config, BangumiResolver, Config, Downloader, DownloaderRegistry,
    MemoryTaskStore, MetadataResolver, SqliteTaskStore, StoreBackend, TaskOrchestrator, TaskStore,
    TorrentIndexDownloader, VideoHostDownloader, YtDlpEngine,
};

use opused_server::api::create_router;
use opused_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("OPUSED_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!(
        store = ?config.store.backend,
        mode = ?config.orchestrator.mode,
        "Configuration loaded"
    );

    let store = create_store(&config)?;
    let registry = create_registry(&config)?;
    info!(sources = ?registry.sources(), "Downloaders registered");

    let resolver: Arc<dyn MetadataResolver> = Arc::new(
        BangumiResolver::new(&config.metadata).context("Failed to create metadata resolver")?,
    );

    let orchestrator = TaskOrchestrator::new(
        config.orchestrator.clone(),
        store,
        Arc::new(registry),
        resolver,
    );

    let recovered = orchestrator
        .recover_interrupted()
        .context("Failed to recover interrupted tasks")?;
    if recovered > 0 {
        warn!(count = recovered, "Marked interrupted downloads as failed");
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, orchestrator.clone()));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    orchestrator.shutdown();
    info!("Server stopped");
    Ok(())
}

fn create_store(config: &Config) -> Result<Arc<dyn TaskStore>> {
    let store: Arc<dyn TaskStore> = match config.store.backend {
        StoreBackend::Sqlite => {
            info!("Using SQLite task store at {:?}", config.store.path);
            Arc::new(
                SqliteTaskStore::new(&config.store.path).context("Failed to open task store")?,
            )
        }
        StoreBackend::Memory => {
            info!("Using in-memory task store");
            Arc::new(MemoryTaskStore::new())
        }
    };
    Ok(store)
}

fn create_registry(config: &Config) -> Result<DownloaderRegistry> {
    let engine = Arc::new(YtDlpEngine::new(&config.video_host));
    let video: Arc<dyn Downloader> = Arc::new(VideoHostDownloader::new(engine, &config.video_host));
    let torrent: Arc<dyn Downloader> = Arc::new(
        TorrentIndexDownloader::new(&config.torrent_index)
            .context("Failed to create torrent index downloader")?,
    );
    Ok(DownloaderRegistry::new(vec![video, torrent]))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
