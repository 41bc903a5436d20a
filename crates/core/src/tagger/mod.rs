//! Audio tag inspection and editing.

mod lofty_editor;

pub use lofty_editor::LoftyTagEditor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when reading or writing tags.
#[derive(Debug, Error)]
pub enum TaggerError {
    /// The file could not be opened or parsed as audio.
    #[error("Failed to read tags from {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// The tags could not be written back.
    #[error("Failed to write tags to {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// Artwork bytes are not a supported image.
    #[error("Invalid artwork for {path}: {reason}")]
    InvalidArtwork { path: PathBuf, reason: String },

    /// The blocking tag task panicked or was cancelled.
    #[error("Tag task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Current tag contents of an audio file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagState {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub has_lyrics: bool,
    pub has_artwork: bool,
}

/// Tag values to write.
///
/// Text fields and the year always overwrite. Lyrics and artwork are only
/// touched when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagUpdate {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// `None` removes any existing year tag.
    pub year: Option<u32>,
    pub lyrics: Option<String>,
    /// Front cover image bytes.
    pub artwork: Option<Vec<u8>>,
}

/// Reads and writes audio tags.
#[async_trait]
pub trait TagEditor: Send + Sync {
    /// Returns the name of this tag editor implementation.
    fn name(&self) -> &str;

    async fn inspect(&self, path: &Path) -> Result<TagState, TaggerError>;

    async fn apply(&self, path: &Path, update: TagUpdate) -> Result<(), TaggerError>;
}
