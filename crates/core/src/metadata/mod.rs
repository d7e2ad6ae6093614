//! Metadata resolution: turning an anime title into candidate songs.
//!
//! The resolver searches an external catalog (Bangumi) for the anime, then
//! looks up its opening/ending song entries and extracts the performing artist
//! from each entry's description.

mod artist;
mod bangumi;

pub use artist::{extract_artist, UNKNOWN_ARTIST};
pub use bangumi::BangumiResolver;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::Metadata;

/// Song title of the placeholder returned when an anime has no song entries.
pub const PLACEHOLDER_SONG_TITLE: &str = "Unknown Song";

/// Song type of the placeholder entry.
pub const PLACEHOLDER_SONG_TYPE: &str = "OP/ED";

/// Errors that can occur when querying the metadata catalog.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// HTTP request failed (includes timeouts).
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error status.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// Turns an anime title into zero or more song candidates.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolve `anime_title`, optionally authenticating with `token`.
    ///
    /// An unknown title yields an empty list, not an error. A known title
    /// without song entries yields exactly one placeholder entry whose song
    /// and artist are meant to be edited by the user.
    async fn resolve(
        &self,
        anime_title: &str,
        token: Option<&str>,
    ) -> Result<Vec<Metadata>, MetadataError>;
}

/// Placeholder candidate for a catalog subject without song entries.
pub fn placeholder_metadata(anime_title: &str, bangumi_id: Option<String>) -> Metadata {
    Metadata {
        anime_title: anime_title.to_string(),
        song_title: PLACEHOLDER_SONG_TITLE.to_string(),
        artist: UNKNOWN_ARTIST.to_string(),
        song_type: PLACEHOLDER_SONG_TYPE.to_string(),
        bangumi_id,
    }
}
