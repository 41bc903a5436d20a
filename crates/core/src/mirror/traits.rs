//! Trait definitions for the mirror module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TransferError;
use super::types::RemoteEntry;

/// A remote file store with a working directory.
///
/// Directory paths given to [`list_entries`](Self::list_entries),
/// [`make_directory`](Self::make_directory) and
/// [`change_context`](Self::change_context) are relative to the target root,
/// with `""` meaning the root itself. File names given to `put`, `remove` and
/// `stat` are resolved in the working directory and must be plain names.
///
/// Methods take `&mut self` so a working directory is never shared between
/// two operations in flight.
#[async_trait]
pub trait RemoteTarget: Send + Sync {
    /// Returns the name of this target implementation.
    fn name(&self) -> &str;

    /// Lists files and directories of `path`.
    async fn list_entries(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransferError>;

    /// Creates a directory. Fails if it already exists.
    async fn make_directory(&mut self, path: &str) -> Result<(), TransferError>;

    /// Sets the working directory.
    async fn change_context(&mut self, path: &str) -> Result<(), TransferError>;

    /// Uploads `local` as `remote_name`, returning the bytes sent.
    async fn put(&mut self, local: &Path, remote_name: &str) -> Result<u64, TransferError>;

    async fn remove(&mut self, remote_name: &str) -> Result<(), TransferError>;

    async fn stat(&mut self, remote_name: &str) -> Result<RemoteEntry, TransferError>;
}

/// Rejects anything but a single plain path component.
pub(super) fn validate_name(name: &str) -> Result<(), TransferError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(TransferError::InvalidName(name.to_string()));
    }
    Ok(())
}
