//! Testing utilities and mock implementations.
//!
//! Mocks for the metadata resolver, the video engine and whole downloaders,
//! so the orchestrator and the HTTP layer can be exercised without network
//! access or external binaries.
//!
//! # Example
//!
//! ```rust,ignore
//! use opused_core::testing::{fixtures, MockDownloader, MockMetadataResolver};
//!
//! let resolver = MockMetadataResolver::new();
//! resolver.set_results("Lycoris Recoil", vec![fixtures::metadata("Lycoris Recoil", "ALIVE")]);
//!
//! let downloader = MockDownloader::new(Source::VideoHost);
//! downloader.fail_with("network unreachable");
//! ```

mod mock_downloader;
mod mock_metadata;
mod mock_video_engine;

pub use mock_downloader::MockDownloader;
pub use mock_metadata::{MockMetadataResolver, RecordedLookup};
pub use mock_video_engine::MockVideoEngine;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::task::{DownloadMode, Metadata, Source, Task};

    /// Opening-song metadata with a fixed artist.
    pub fn metadata(anime_title: &str, song_title: &str) -> Metadata {
        Metadata::new(anime_title, song_title, "ClariS", "OP")
    }

    /// Pending task with searchable metadata.
    pub fn task(source: Source, target_dir: &str) -> Task {
        Task::new("Lycoris Recoil", target_dir, source, DownloadMode::Video)
            .with_metadata(metadata("Lycoris Recoil", "ALIVE"))
    }
}
