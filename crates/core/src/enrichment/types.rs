//! Types for the enrichment module.

use serde::Serialize;

/// What a build fetches from the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Fetch lyrics for files without them.
    pub pull_lyrics: bool,
    /// With `pull_lyrics`, refetch lyrics even when the file has some.
    pub force_lyrics_refresh: bool,
    /// Refetch cover art even when the file has one.
    pub force_artwork_refresh: bool,
}

/// Result of building one destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub destination: String,
    /// Tracks present and tagged in the destination, in build order.
    pub built: Vec<u64>,
    /// Tracks without a raw download.
    pub skipped: Vec<u64>,
    /// Files newly copied from the raw downloads.
    pub copied: usize,
    pub lyrics_fetched: usize,
    pub artwork_fetched: usize,
    /// Stale files deleted from the destination.
    pub removed: Vec<String>,
}

impl BuildReport {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Default::default()
        }
    }
}

/// A destination directory under `dist/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltDestination {
    pub name: String,
    /// Name of the playlist the destination was built from, when known.
    pub playlist_name: Option<String>,
    /// Number of files in the directory.
    pub files: usize,
}

impl BuiltDestination {
    /// Playlist name, or `?` for ad-hoc builds and unknown playlists.
    pub fn display_name(&self) -> &str {
        self.playlist_name.as_deref().unwrap_or("?")
    }
}
