//! Types for the mirror module.

use serde::Serialize;
use std::path::PathBuf;

/// An entry listed by a remote target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            is_dir: true,
        }
    }
}

/// A built file that should exist on the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub size: u64,
}

/// What happened to one remote file during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Created,
    Updated,
    Unchanged,
    /// No local build for a playlist track.
    Skipped,
    Removed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub name: String,
    pub action: FileAction,
    /// Bytes transferred, for uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn new(name: impl Into<String>, action: FileAction) -> Self {
        Self {
            name: name.into(),
            action,
            bytes: None,
            error: None,
        }
    }

    pub fn transferred(name: impl Into<String>, action: FileAction, bytes: u64) -> Self {
        Self {
            bytes: Some(bytes),
            ..Self::new(name, action)
        }
    }

    pub fn failed(name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(name, FileAction::Failed)
        }
    }
}

/// Result of syncing one playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub playlist_id: u64,
    pub remote_dir: String,
    pub outcomes: Vec<FileOutcome>,
}

impl SyncReport {
    pub fn count(&self, action: FileAction) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }

    /// Files uploaded, new or replaced.
    pub fn uploads(&self) -> usize {
        self.count(FileAction::Created) + self.count(FileAction::Updated)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.action == FileAction::Failed)
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}
