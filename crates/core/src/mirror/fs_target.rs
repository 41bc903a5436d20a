//! Remote target on a mounted directory.
//!
//! Any remote store that can be mounted locally (sshfs, rclone mount, a NAS
//! share) can be mirrored through this target.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::error::TransferError;
use super::traits::{validate_name, RemoteTarget};
use super::types::RemoteEntry;
use crate::config::MirrorConfig;

/// File system based remote target.
#[derive(Debug)]
pub struct FsRemoteTarget {
    root: PathBuf,
    /// Working directory, relative to `root`.
    context: PathBuf,
    put_attempts: u32,
}

impl FsRemoteTarget {
    pub fn new(root: impl Into<PathBuf>, put_attempts: u32) -> Self {
        Self {
            root: root.into(),
            context: PathBuf::new(),
            put_attempts: put_attempts.max(1),
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.root.clone(), config.put_attempts)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a directory path relative to the root.
    fn resolve_dir(&self, path: &str) -> Result<PathBuf, TransferError> {
        if path.is_empty() {
            return Ok(self.root.clone());
        }
        validate_name(path)?;
        Ok(self.root.join(path))
    }

    /// Resolves a file name in the working directory.
    fn resolve_file(&self, name: &str) -> Result<PathBuf, TransferError> {
        validate_name(name)?;
        Ok(self.root.join(&self.context).join(name))
    }

    fn temp_path(dest: &Path) -> PathBuf {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        dest.with_file_name(format!(".{}.part", name))
    }

    /// Copies to a temporary name, then renames over the destination.
    async fn put_once(local: &Path, dest: &Path) -> Result<u64, std::io::Error> {
        let temp = Self::temp_path(dest);
        let size = match fs::copy(local, &temp).await {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&temp).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&temp, dest).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        Ok(size)
    }
}

fn not_found_or_io(e: std::io::Error, what: &str) -> TransferError {
    if e.kind() == std::io::ErrorKind::NotFound {
        TransferError::NotFound(what.to_string())
    } else {
        TransferError::Io(e)
    }
}

#[async_trait]
impl RemoteTarget for FsRemoteTarget {
    fn name(&self) -> &str {
        "fs"
    }

    async fn list_entries(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransferError> {
        let dir = self.resolve_dir(path)?;
        let mut reader = fs::read_dir(&dir)
            .await
            .map_err(|e| not_found_or_io(e, path))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let metadata = entry.metadata().await?;
            entries.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                is_dir: metadata.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn make_directory(&mut self, path: &str) -> Result<(), TransferError> {
        validate_name(path)?;
        fs::create_dir(self.root.join(path)).await?;
        debug!("Created remote directory {}", path);
        Ok(())
    }

    async fn change_context(&mut self, path: &str) -> Result<(), TransferError> {
        let dir = self.resolve_dir(path)?;
        if !fs::metadata(&dir)
            .await
            .map_err(|e| not_found_or_io(e, path))?
            .is_dir()
        {
            return Err(TransferError::NotFound(path.to_string()));
        }
        self.context = PathBuf::from(path);
        Ok(())
    }

    async fn put(&mut self, local: &Path, remote_name: &str) -> Result<u64, TransferError> {
        let dest = self.resolve_file(remote_name)?;
        if !local.is_file() {
            return Err(TransferError::NotFound(local.display().to_string()));
        }

        let mut attempt = 1;
        loop {
            match Self::put_once(local, &dest).await {
                Ok(size) => return Ok(size),
                Err(e) if attempt < self.put_attempts => {
                    warn!(
                        "Upload of {} failed (attempt {}/{}): {}, retrying",
                        remote_name, attempt, self.put_attempts, e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(TransferError::Io(e)),
            }
        }
    }

    async fn remove(&mut self, remote_name: &str) -> Result<(), TransferError> {
        let path = self.resolve_file(remote_name)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(e, remote_name))
    }

    async fn stat(&mut self, remote_name: &str) -> Result<RemoteEntry, TransferError> {
        let path = self.resolve_file(remote_name)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(e, remote_name))?;
        Ok(RemoteEntry {
            name: remote_name.to_string(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            is_dir: metadata.is_dir(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir, FsRemoteTarget) {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let target = FsRemoteTarget::new(remote.path(), 3);
        (local, remote, target)
    }

    #[tokio::test]
    async fn test_directory_and_context() {
        let (_local, remote, mut target) = setup();

        target.make_directory("Road Trip").await.unwrap();
        assert!(remote.path().join("Road Trip").is_dir());
        assert!(target.make_directory("Road Trip").await.is_err());

        let root = target.list_entries("").await.unwrap();
        assert_eq!(root, vec![RemoteEntry::dir("Road Trip")]);

        target.change_context("Road Trip").await.unwrap();
        assert!(matches!(
            target.change_context("missing").await,
            Err(TransferError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_stat_remove() {
        let (local, remote, mut target) = setup();
        let source = local.path().join("1.mp3");
        std::fs::write(&source, vec![7u8; 500]).unwrap();

        target.make_directory("p").await.unwrap();
        target.change_context("p").await.unwrap();

        assert_eq!(target.put(&source, "1.mp3").await.unwrap(), 500);
        assert_eq!(
            std::fs::metadata(remote.path().join("p/1.mp3")).unwrap().len(),
            500
        );
        assert_eq!(target.stat("1.mp3").await.unwrap().size, 500);

        // No temporary file left behind
        let listed = target.list_entries("p").await.unwrap();
        assert_eq!(listed, vec![RemoteEntry::file("1.mp3", 500)]);

        target.remove("1.mp3").await.unwrap();
        assert!(matches!(
            target.stat("1.mp3").await,
            Err(TransferError::NotFound(_))
        ));
        assert!(matches!(
            target.remove("1.mp3").await,
            Err(TransferError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_replaces_existing() {
        let (local, _remote, mut target) = setup();
        let source = local.path().join("1.mp3");
        std::fs::write(&source, vec![1u8; 10]).unwrap();
        target.put(&source, "1.mp3").await.unwrap();

        std::fs::write(&source, vec![2u8; 20]).unwrap();
        assert_eq!(target.put(&source, "1.mp3").await.unwrap(), 20);
        assert_eq!(target.stat("1.mp3").await.unwrap().size, 20);
    }

    #[tokio::test]
    async fn test_put_missing_source() {
        let (local, _remote, mut target) = setup();
        let result = target.put(&local.path().join("nope.mp3"), "nope.mp3").await;
        assert!(matches!(result, Err(TransferError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let (local, _remote, mut target) = setup();
        let source = local.path().join("1.mp3");
        std::fs::write(&source, b"x").unwrap();

        for name in ["", ".", "..", "../1.mp3", "a/b", "a\\b"] {
            assert!(
                matches!(
                    target.put(&source, name).await,
                    Err(TransferError::InvalidName(_))
                ),
                "accepted {:?}",
                name
            );
        }
        assert!(matches!(
            target.make_directory("..").await,
            Err(TransferError::InvalidName(_))
        ));
        assert!(matches!(
            target.change_context("../x").await,
            Err(TransferError::InvalidName(_))
        ));
    }
}
