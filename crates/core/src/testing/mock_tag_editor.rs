//! Mock tag editor for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::tagger::{TagEditor, TagState, TagUpdate, TaggerError};

/// A recorded tag write for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedApply {
    pub path: PathBuf,
    pub update: TagUpdate,
}

/// Mock implementation of the TagEditor trait.
///
/// Tag state lives in memory per path; files are never touched, but
/// `inspect` still fails for paths that do not exist on disk.
#[derive(Debug, Default)]
pub struct MockTagEditor {
    states: Arc<RwLock<HashMap<PathBuf, TagState>>>,
    applies: Arc<RwLock<Vec<RecordedApply>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TaggerError>>>,
}

impl MockTagEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset the tag state of a file.
    pub async fn set_state(&self, path: &Path, state: TagState) {
        self.states.write().await.insert(path.to_path_buf(), state);
    }

    pub async fn state(&self, path: &Path) -> Option<TagState> {
        self.states.read().await.get(path).cloned()
    }

    /// Get all recorded tag writes.
    pub async fn recorded_applies(&self) -> Vec<RecordedApply> {
        self.applies.read().await.clone()
    }

    /// Clear recorded tag writes.
    pub async fn clear_recorded(&self) {
        self.applies.write().await.clear();
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TaggerError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<TaggerError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl TagEditor for MockTagEditor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn inspect(&self, path: &Path) -> Result<TagState, TaggerError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if !path.is_file() {
            return Err(TaggerError::Read {
                path: path.to_path_buf(),
                reason: "no such file".to_string(),
            });
        }
        Ok(self.state(path).await.unwrap_or_default())
    }

    async fn apply(&self, path: &Path, update: TagUpdate) -> Result<(), TaggerError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let mut states = self.states.write().await;
        let state = states.entry(path.to_path_buf()).or_default();
        state.title = Some(update.title.clone());
        state.artist = Some(update.artist.clone());
        state.album = Some(update.album.clone());
        state.year = update.year;
        if let Some(lyrics) = &update.lyrics {
            state.has_lyrics = !lyrics.trim().is_empty();
        }
        if update.artwork.is_some() {
            state.has_artwork = true;
        }
        drop(states);

        self.applies.write().await.push(RecordedApply {
            path: path.to_path_buf(),
            update,
        });
        Ok(())
    }
}
