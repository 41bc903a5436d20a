//! Enrichment pipeline: builds tagged copies of raw downloads.
//!
//! A build copies each track's raw download into `dist/<destination>/`,
//! rewrites its tags from the catalog, fills in lyrics and cover art, then
//! removes files that no longer belong to the destination.

mod builds;
mod pipeline;
mod types;

pub use builds::{adhoc_destination, list_builds};
pub use pipeline::BuildPipeline;
pub use types::*;

use thiserror::Error;

use crate::provider::ProviderError;
use crate::tagger::TaggerError;

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Tags of a built file could not be read or written.
    #[error("Tag error: {0}")]
    Tag(#[from] TaggerError),

    /// Lyrics or artwork could not be fetched.
    #[error("Failed to fetch {what} for track {track_id}")]
    Enrichment {
        track_id: u64,
        what: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Build cancelled")]
    Cancelled,

    #[error("Playlist not found in catalog: {0}")]
    PlaylistNotFound(u64),
}

impl BuildError {
    pub fn enrichment(track_id: u64, what: &'static str, source: ProviderError) -> Self {
        Self::Enrichment {
            track_id,
            what,
            source,
        }
    }
}
