use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Upper bound for every configured timeout: one day.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub video_host: VideoHostConfig,
    #[serde(default)]
    pub torrent_index: TorrentIndexConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8000
}

/// Which task store shape the process runs with.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Durable SQLite file with active and history tables.
    #[default]
    Sqlite,
    /// Process memory only.
    Memory,
}

/// Task store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database file (sqlite backend only)
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("opused.db")
}

/// How a submitted task is executed.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Accept immediately and run in the background; clients poll for status.
    #[default]
    Background,
    /// Run to a terminal state before answering.
    Inline,
}

/// Orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Maximum downloads running at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_concurrent_downloads: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

/// yt-dlp engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoHostConfig {
    /// Path or name of the yt-dlp executable
    #[serde(default = "default_ytdlp_binary")]
    pub binary: String,
    /// yt-dlp format selector
    #[serde(default = "default_format")]
    pub format: String,
    /// Upper bound for one engine run, in seconds
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
    /// Per-connection socket timeout passed to yt-dlp, in seconds
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_secs: u64,
}

impl Default for VideoHostConfig {
    fn default() -> Self {
        Self {
            binary: default_ytdlp_binary(),
            format: default_format(),
            timeout_secs: default_engine_timeout(),
            socket_timeout_secs: default_socket_timeout(),
        }
    }
}

fn default_ytdlp_binary() -> String {
    "yt-dlp".to_string()
}

fn default_format() -> String {
    "bestaudio/best".to_string()
}

fn default_engine_timeout() -> u64 {
    600
}

fn default_socket_timeout() -> u64 {
    30
}

/// Torrent index (share.dmhy.org) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentIndexConfig {
    #[serde(default = "default_dmhy_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_dmhy_timeout")]
    pub timeout_secs: u64,
}

impl Default for TorrentIndexConfig {
    fn default() -> Self {
        Self {
            base_url: default_dmhy_url(),
            timeout_secs: default_dmhy_timeout(),
        }
    }
}

fn default_dmhy_url() -> String {
    "https://share.dmhy.org".to_string()
}

fn default_dmhy_timeout() -> u64 {
    15
}

/// Bangumi metadata catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    #[serde(default = "default_bangumi_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_bangumi_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: default_bangumi_url(),
            timeout_secs: default_bangumi_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_bangumi_url() -> String {
    "https://api.bgm.tv".to_string()
}

fn default_bangumi_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!(
        "twkevinzhang/OpusED/{} (https://github.com/twkevinzhang/OpusED)",
        env!("CARGO_PKG_VERSION")
    )
}
