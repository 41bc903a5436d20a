//! Ingestion of provider data into the local library.
//!
//! Pulls track details, playlists and the account's playlist list into the
//! [`CatalogStore`](crate::catalog::CatalogStore), and downloads raw audio
//! into `musics/`.
//!
//! Failures of a single track are logged and counted; only failures of the
//! enclosing operation (the playlist lookup, a catalog save) are returned as
//! errors.

mod download;
mod ingestor;
mod types;

pub use download::should_skip_download;
pub use ingestor::{normalize_playlist_name, Ingestor};
pub use types::*;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::provider::ProviderError;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ingestion cancelled")]
    Cancelled,
}
