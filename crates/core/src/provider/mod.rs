//! Source provider integration.
//!
//! The provider is the remote service the catalog is pulled from. It is
//! reached through [`SourceProvider`]; [`HttpProvider`] talks to a
//! NeteaseCloudMusicApi-compatible HTTP server.

mod http;
mod throttle;
mod types;

pub use http::HttpProvider;
pub use throttle::Throttle;
pub use types::*;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::catalog::Track;

/// Errors that can occur when talking to the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success code.
    #[error("API error: {code} - {message}")]
    Api { code: i64, message: String },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The configured session is not logged in.
    #[error("Provider session is not logged in")]
    NotLoggedIn,

    /// Writing a download failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::Api { code, .. } => *code >= 500 || *code == 429,
            Self::Io(_) => true,
            Self::NotFound(_) | Self::Parse(_) | Self::NotLoggedIn => false,
        }
    }
}

/// A remote catalog and audio source.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Returns the name of this provider implementation.
    fn name(&self) -> &str;

    /// Checks the configured session and returns the account it belongs to.
    async fn acquire_session(&self) -> Result<Session, ProviderError>;

    async fn fetch_track_detail(&self, track_id: u64) -> Result<Track, ProviderError>;

    async fn fetch_lyrics(&self, track_id: u64) -> Result<Lyrics, ProviderError>;

    async fn fetch_audio_stream_info(&self, track_id: u64)
        -> Result<AudioStreamInfo, ProviderError>;

    async fn fetch_playlist_info(&self, playlist_id: u64) -> Result<PlaylistInfo, ProviderError>;

    /// Track references of a playlist, in playlist order.
    async fn fetch_playlist_track_ids(
        &self,
        playlist_id: u64,
    ) -> Result<Vec<PlaylistEntry>, ProviderError>;

    /// The logged-in account and its playlists.
    async fn fetch_account(&self) -> Result<AccountSnapshot, ProviderError>;

    /// Downloads cover art.
    async fn fetch_artwork(&self, url: &str) -> Result<Vec<u8>, ProviderError>;

    /// Downloads audio to `dest`, replacing it only once the transfer has
    /// completed. Returns the number of bytes written.
    async fn download_audio(&self, url: &str, dest: &Path) -> Result<u64, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ProviderError::api(503, "busy").is_retryable());
        assert!(ProviderError::api(429, "slow down").is_retryable());
        assert!(!ProviderError::api(301, "login required").is_retryable());
        assert!(!ProviderError::NotLoggedIn.is_retryable());
        assert!(!ProviderError::NotFound("song 1".into()).is_retryable());
        assert!(ProviderError::Io(std::io::Error::other("disk")).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::api(404, "no such playlist");
        assert_eq!(err.to_string(), "API error: 404 - no such playlist");
    }
}
