//! Mock video engine for testing.

use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

use crate::downloader::{EngineError, EngineEvent, EngineRequest, VideoEngine};

/// Mock implementation of [`VideoEngine`].
///
/// Replays the configured events on every fetch, then succeeds unless a
/// failure was configured.
#[derive(Debug, Default)]
pub struct MockVideoEngine {
    events: Mutex<Vec<EngineEvent>>,
    failure: Mutex<Option<String>>,
    requests: Mutex<Vec<EngineRequest>>,
}

impl MockVideoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_events(&self, events: Vec<EngineEvent>) {
        *self.events.lock().unwrap() = events;
    }

    /// Fail every fetch with `message` after replaying the events.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn recorded_requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl VideoEngine for MockVideoEngine {
    fn fetch(
        &self,
        request: &EngineRequest,
        events: &UnboundedSender<EngineEvent>,
    ) -> Result<(), EngineError> {
        self.requests.lock().unwrap().push(request.clone());

        for event in self.events.lock().unwrap().iter() {
            let _ = events.send(event.clone());
        }

        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(EngineError::Failed {
                code: Some(1),
                message,
            }),
            None => Ok(()),
        }
    }
}
