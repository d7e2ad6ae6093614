pub mod config;
pub mod downloader;
pub mod metadata;
pub mod orchestrator;
pub mod task;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ExecutionMode,
    MetadataConfig, OrchestratorConfig, StoreBackend, TorrentIndexConfig, VideoHostConfig,
};
pub use downloader::{
    Downloader, DownloaderRegistry, ProgressSink, TorrentIndexDownloader, VideoHostDownloader,
    YtDlpEngine,
};
pub use metadata::{BangumiResolver, MetadataError, MetadataResolver};
pub use orchestrator::{BatchRequest, OrchestratorError, SubmitOutcome, TaskOrchestrator, TaskSpec};
pub use task::{
    DownloadMode, MemoryTaskStore, Metadata, Source, SqliteTaskStore, Task, TaskStatus, TaskStore,
    TaskStoreError,
};
