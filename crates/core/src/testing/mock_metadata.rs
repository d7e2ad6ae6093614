//! Mock metadata resolver for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::metadata::{MetadataError, MetadataResolver};
use crate::task::Metadata;

/// A recorded resolve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLookup {
    pub anime_title: String,
    pub token: Option<String>,
}

/// Mock implementation of [`MetadataResolver`].
///
/// Titles without configured results resolve to an empty list.
#[derive(Debug, Default)]
pub struct MockMetadataResolver {
    results: Mutex<HashMap<String, Vec<Metadata>>>,
    lookups: Mutex<Vec<RecordedLookup>>,
    next_error: Mutex<Option<String>>,
}

impl MockMetadataResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results returned for `anime_title`.
    pub fn set_results(&self, anime_title: &str, results: Vec<Metadata>) {
        self.results
            .lock()
            .unwrap()
            .insert(anime_title.to_string(), results);
    }

    /// Make the next resolve call fail.
    pub fn fail_next(&self, message: &str) {
        *self.next_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn recorded_lookups(&self) -> Vec<RecordedLookup> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataResolver for MockMetadataResolver {
    async fn resolve(
        &self,
        anime_title: &str,
        token: Option<&str>,
    ) -> Result<Vec<Metadata>, MetadataError> {
        self.lookups.lock().unwrap().push(RecordedLookup {
            anime_title: anime_title.to_string(),
            token: token.map(str::to_string),
        });

        if let Some(message) = self.next_error.lock().unwrap().take() {
            return Err(MetadataError::ApiError {
                status: 503,
                message,
            });
        }

        Ok(self
            .results
            .lock()
            .unwrap()
            .get(anime_title)
            .cloned()
            .unwrap_or_default())
    }
}
