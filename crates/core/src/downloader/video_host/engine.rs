use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// What the engine should fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    /// Engine target, e.g. `ytsearch1:<query>`.
    pub target: String,
    /// Output path template rooted at the task's target directory.
    pub output_template: String,
    /// Format selector.
    pub format: String,
}

/// Event emitted by an engine while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Bytes downloaded so far; the total is unknown for some streams.
    Progress { downloaded: u64, total: Option<u64> },
    /// A non-fatal error line reported by the engine.
    Error(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("video engine not found: {binary}")]
    NotFound { binary: String },

    #[error("video engine failed (exit code {code:?}): {message}")]
    Failed { code: Option<i32>, message: String },

    #[error("video engine timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("video engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A blocking video search-and-fetch engine.
///
/// `fetch` runs on the blocking pool and reports progress through `events`.
/// Returning `Ok` means the media was written under the output template.
pub trait VideoEngine: Send + Sync {
    fn fetch(
        &self,
        request: &EngineRequest,
        events: &UnboundedSender<EngineEvent>,
    ) -> Result<(), EngineError>;
}
