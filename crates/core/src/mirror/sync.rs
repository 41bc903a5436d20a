//! Keeps a remote directory in step with a built playlist.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{MirrorError, TransferError};
use super::traits::RemoteTarget;
use super::types::{FileAction, FileOutcome, LocalArtifact, SyncReport};
use crate::catalog::{dedup_ids, CatalogStore};
use crate::layout::LibraryLayout;
use crate::reconcile::{self, ActualEntry};

/// Mirrors built playlists to a [`RemoteTarget`].
pub struct MirrorSync {
    layout: LibraryLayout,
    cancel: CancellationToken,
}

impl MirrorSync {
    pub fn new(layout: LibraryLayout) -> Self {
        Self {
            layout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Remote directory for a playlist: its name, with path separators
    /// replaced.
    pub fn remote_dir_name(playlist_name: &str) -> String {
        let name: String = playlist_name
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        match name.as_str() {
            "" | "." | ".." => "_".to_string(),
            _ => name,
        }
    }

    /// Uploads new and changed builds of a playlist and removes remote files
    /// that are no longer part of it.
    ///
    /// Failures of single files are reported and do not stop the sync.
    pub async fn sync(
        &self,
        store: &CatalogStore,
        playlist_id: u64,
        target: &mut dyn RemoteTarget,
    ) -> Result<SyncReport, MirrorError> {
        let playlist = store
            .playlist(playlist_id)
            .ok_or(MirrorError::PlaylistNotFound(playlist_id))?;
        let remote_dir = Self::remote_dir_name(&playlist.name);
        let mut outcomes = Vec::new();

        let root = target.list_entries("").await?;
        if !root.iter().any(|e| e.is_dir && e.name == remote_dir) {
            info!("Creating remote directory: {}", remote_dir);
            target.make_directory(&remote_dir).await?;
        }
        target.change_context(&remote_dir).await?;

        let destination = playlist_id.to_string();
        let mut desired = BTreeMap::new();
        for track_id in dedup_ids(&playlist.music_ids) {
            let path = self.layout.dist_path(&destination, track_id);
            let name = LibraryLayout::audio_file_name(track_id);
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => {
                    desired.insert(
                        name,
                        LocalArtifact {
                            path,
                            size: metadata.len(),
                        },
                    );
                }
                _ => {
                    warn!(
                        "No build for track {} ({}), skipping",
                        track_id,
                        self.layout.display_path(&path)
                    );
                    outcomes.push(FileOutcome::new(name, FileAction::Skipped));
                }
            }
        }

        let actual: Vec<ActualEntry> = target
            .list_entries(&remote_dir)
            .await?
            .into_iter()
            .filter(|e| !e.is_dir)
            .map(|e| ActualEntry::new(e.name, Some(e.size)))
            .collect();

        let diff = reconcile::diff(&desired, &actual, |local: &LocalArtifact, remote| {
            remote.size == Some(local.size)
        });
        debug!(
            "Mirror diff for {}: {} to create, {} to update, {} to remove, {} unchanged",
            remote_dir,
            diff.to_create.len(),
            diff.to_update.len(),
            diff.to_remove.len(),
            diff.unchanged.len()
        );

        for name in &diff.unchanged {
            outcomes.push(FileOutcome::new(name.clone(), FileAction::Unchanged));
        }

        let uploads = diff
            .to_create
            .iter()
            .map(|n| (n, FileAction::Created))
            .chain(diff.to_update.iter().map(|n| (n, FileAction::Updated)));
        for (name, action) in uploads {
            if self.cancel.is_cancelled() {
                return Err(MirrorError::Cancelled);
            }
            let Some(local) = desired.get(name) else {
                continue;
            };
            match upload_verified(target, local, name).await {
                Ok(bytes) => {
                    info!("Uploaded: {}/{} ({} bytes)", remote_dir, name, bytes);
                    outcomes.push(FileOutcome::transferred(name.clone(), action, bytes));
                }
                Err(e) => {
                    warn!("Failed to upload {}/{}: {}", remote_dir, name, e);
                    outcomes.push(FileOutcome::failed(name.clone(), e));
                }
            }
        }

        for name in &diff.to_remove {
            if self.cancel.is_cancelled() {
                return Err(MirrorError::Cancelled);
            }
            match target.remove(name).await {
                Ok(()) => {
                    info!("Removed: {}/{}", remote_dir, name);
                    outcomes.push(FileOutcome::new(name.clone(), FileAction::Removed));
                }
                Err(e) => {
                    warn!("Failed to remove {}/{}: {}", remote_dir, name, e);
                    outcomes.push(FileOutcome::failed(name.clone(), e));
                }
            }
        }

        Ok(SyncReport {
            playlist_id,
            remote_dir,
            outcomes,
        })
    }
}

/// Uploads one file and checks the remote size afterwards.
async fn upload_verified(
    target: &mut dyn RemoteTarget,
    local: &LocalArtifact,
    name: &str,
) -> Result<u64, TransferError> {
    let bytes = target.put(&local.path, name).await?;
    let remote = target.stat(name).await?;
    if remote.size != local.size {
        return Err(TransferError::Verification {
            name: name.to_string(),
            expected: local.size,
            actual: remote.size,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_dir_name() {
        assert_eq!(MirrorSync::remote_dir_name("Road Trip"), "Road Trip");
        assert_eq!(MirrorSync::remote_dir_name("AC/DC\\Live"), "AC_DC_Live");
        assert_eq!(MirrorSync::remote_dir_name("夜曲"), "夜曲");
        assert_eq!(MirrorSync::remote_dir_name(".."), "_");
        assert_eq!(MirrorSync::remote_dir_name(""), "_");
    }
}
