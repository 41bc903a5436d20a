//! Error types for the mirror module.

use thiserror::Error;

/// Errors raised by a [`RemoteTarget`](super::RemoteTarget).
#[derive(Debug, Error)]
pub enum TransferError {
    /// Remote entry or local source does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Name is empty or would escape the working directory.
    #[error("Invalid remote name: {0:?}")]
    InvalidName(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed for {0}")]
    Authentication(String),

    /// SSH session or SFTP protocol error.
    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    /// The uploaded file does not have the expected size.
    #[error("Size mismatch for {name}: expected {expected} bytes, remote has {actual}")]
    Verification {
        name: String,
        expected: u64,
        actual: u64,
    },
}

/// Errors that abort a mirror sync.
///
/// Per-file transfer failures do not abort; they are reported in the
/// [`SyncReport`](super::SyncReport).
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Playlist not found in catalog: {0}")]
    PlaylistNotFound(u64),

    /// Preparing or listing the remote directory failed.
    #[error("Remote target error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Mirror sync cancelled")]
    Cancelled,
}
