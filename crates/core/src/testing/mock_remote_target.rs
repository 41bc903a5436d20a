//! Mock remote target for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::mirror::{RemoteEntry, RemoteTarget, TransferError};

/// A recorded upload for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPut {
    /// Working directory at the time of the upload.
    pub dir: String,
    pub name: String,
    pub bytes: u64,
}

/// In-memory implementation of the RemoteTarget trait.
///
/// Keeps file names and sizes per directory. The root directory is `""`.
/// Uploads read the local file to get its real size, so a sync against this
/// target verifies like it would against a real one.
///
/// # Example
///
/// ```rust,ignore
/// use cloudtune_core::testing::MockRemoteTarget;
///
/// let mut target = MockRemoteTarget::new();
/// target.add_file("Road Trip", "103.mp3", 999);
///
/// mirror.sync(&store, 7001, &mut target).await?;
/// assert_eq!(target.files("Road Trip"), vec![("101.mp3".into(), 500)]);
/// ```
#[derive(Debug, Default)]
pub struct MockRemoteTarget {
    /// Directory -> file name -> size.
    dirs: BTreeMap<String, BTreeMap<String, u64>>,
    context: String,
    puts: Vec<RecordedPut>,
    removes: Vec<String>,
    made_dirs: Vec<String>,
    failing_puts: HashSet<String>,
    failing_removes: HashSet<String>,
    /// Uploads whose stored size is off by one.
    corrupt_puts: HashSet<String>,
    fail_listing: bool,
}

impl MockRemoteTarget {
    /// Create an empty target with only the root directory.
    pub fn new() -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert(String::new(), BTreeMap::new());
        Self {
            dirs,
            ..Default::default()
        }
    }

    /// Add a directory under the root.
    pub fn add_dir(&mut self, dir: &str) {
        self.dirs.entry(dir.to_string()).or_default();
    }

    /// Add a file, creating its directory if needed.
    pub fn add_file(&mut self, dir: &str, name: &str, size: u64) {
        self.dirs
            .entry(dir.to_string())
            .or_default()
            .insert(name.to_string(), size);
    }

    /// Files of a directory with their sizes, sorted by name.
    pub fn files(&self, dir: &str) -> Vec<(String, u64)> {
        self.dirs
            .get(dir)
            .map(|files| files.iter().map(|(n, s)| (n.clone(), *s)).collect())
            .unwrap_or_default()
    }

    pub fn has_dir(&self, dir: &str) -> bool {
        self.dirs.contains_key(dir)
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn recorded_puts(&self) -> &[RecordedPut] {
        &self.puts
    }

    pub fn recorded_removes(&self) -> &[String] {
        &self.removes
    }

    pub fn created_dirs(&self) -> &[String] {
        &self.made_dirs
    }

    /// Clear recorded puts, removes and created directories.
    pub fn clear_recorded(&mut self) {
        self.puts.clear();
        self.removes.clear();
        self.made_dirs.clear();
    }

    pub fn fail_put(&mut self, name: &str) {
        self.failing_puts.insert(name.to_string());
    }

    pub fn fail_remove(&mut self, name: &str) {
        self.failing_removes.insert(name.to_string());
    }

    /// Store the next uploads of `name` with a wrong size.
    pub fn corrupt_put(&mut self, name: &str) {
        self.corrupt_puts.insert(name.to_string());
    }

    /// Make every listing fail.
    pub fn set_fail_listing(&mut self, fail: bool) {
        self.fail_listing = fail;
    }

    fn current_files(&mut self) -> Result<&mut BTreeMap<String, u64>, TransferError> {
        self.dirs
            .get_mut(&self.context)
            .ok_or_else(|| TransferError::NotFound(self.context.clone()))
    }
}

#[async_trait]
impl RemoteTarget for MockRemoteTarget {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_entries(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransferError> {
        if self.fail_listing {
            return Err(TransferError::Io(std::io::Error::other("mock listing failure")));
        }
        let files = self
            .dirs
            .get(path)
            .ok_or_else(|| TransferError::NotFound(path.to_string()))?;

        let mut entries: Vec<RemoteEntry> = files
            .iter()
            .map(|(name, size)| RemoteEntry::file(name.clone(), *size))
            .collect();
        if path.is_empty() {
            entries.extend(
                self.dirs
                    .keys()
                    .filter(|d| !d.is_empty())
                    .map(|d| RemoteEntry::dir(d.clone())),
            );
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn make_directory(&mut self, path: &str) -> Result<(), TransferError> {
        if path.is_empty() || path.contains('/') {
            return Err(TransferError::InvalidName(path.to_string()));
        }
        if self.dirs.contains_key(path) {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                path.to_string(),
            )));
        }
        self.dirs.insert(path.to_string(), BTreeMap::new());
        self.made_dirs.push(path.to_string());
        Ok(())
    }

    async fn change_context(&mut self, path: &str) -> Result<(), TransferError> {
        if !self.dirs.contains_key(path) {
            return Err(TransferError::NotFound(path.to_string()));
        }
        self.context = path.to_string();
        Ok(())
    }

    async fn put(&mut self, local: &Path, remote_name: &str) -> Result<u64, TransferError> {
        if self.failing_puts.contains(remote_name) {
            return Err(TransferError::Io(std::io::Error::other("mock upload failure")));
        }
        let bytes = tokio::fs::metadata(local)
            .await
            .map_err(|_| TransferError::NotFound(local.display().to_string()))?
            .len();
        let stored = if self.corrupt_puts.contains(remote_name) {
            bytes + 1
        } else {
            bytes
        };

        self.current_files()?.insert(remote_name.to_string(), stored);
        self.puts.push(RecordedPut {
            dir: self.context.clone(),
            name: remote_name.to_string(),
            bytes,
        });
        Ok(bytes)
    }

    async fn remove(&mut self, remote_name: &str) -> Result<(), TransferError> {
        if self.failing_removes.contains(remote_name) {
            return Err(TransferError::Io(std::io::Error::other("mock remove failure")));
        }
        self.current_files()?
            .remove(remote_name)
            .ok_or_else(|| TransferError::NotFound(remote_name.to_string()))?;
        self.removes.push(remote_name.to_string());
        Ok(())
    }

    async fn stat(&mut self, remote_name: &str) -> Result<RemoteEntry, TransferError> {
        let size = self
            .current_files()?
            .get(remote_name)
            .copied()
            .ok_or_else(|| TransferError::NotFound(remote_name.to_string()))?;
        Ok(RemoteEntry::file(remote_name, size))
    }
}
