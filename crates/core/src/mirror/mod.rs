//! Mirror module for keeping a remote target consistent with local builds.
//!
//! A playlist's built directory (`dist/<playlist id>/`) is mirrored into a
//! remote directory named after the playlist. The remote side is reached
//! through the [`RemoteTarget`] trait. [`FsRemoteTarget`] implements it on a
//! mounted directory and [`SftpRemoteTarget`] on an SFTP server.
//!
//! # Example
//!
//! ```ignore
//! use cloudtune_core::mirror::{FsRemoteTarget, MirrorSync};
//!
//! let mut target = FsRemoteTarget::new("/mnt/radio/media", 3);
//! let report = MirrorSync::new(layout).sync(&store, 7001, &mut target).await?;
//! println!("{} uploaded, {} failed", report.uploads(), report.failures().count());
//! ```

mod error;
mod fs_target;
mod sftp_target;
mod sync;
mod traits;
mod types;

pub use error::{MirrorError, TransferError};
pub use fs_target::FsRemoteTarget;
pub use sftp_target::SftpRemoteTarget;
pub use sync::MirrorSync;
pub use traits::RemoteTarget;
pub use types::*;
