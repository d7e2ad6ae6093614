//! Task orchestrator: the use-case layer between callers and downloaders.
//!
//! Creates tasks (singly or in batches from resolved metadata), dispatches
//! them to the downloader registry either inline or on the runtime, and
//! archives successful runs to history.

mod runner;
mod types;

pub use runner::TaskOrchestrator;
pub use types::{BatchRequest, OrchestratorError, SubmitOutcome, TaskSpec};
