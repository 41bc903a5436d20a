//! Mock source provider for testing.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::Track;
use crate::provider::{
    AccountSnapshot, AudioStreamInfo, Lyrics, PlaylistEntry, PlaylistInfo, ProviderError, Session,
    SourceProvider,
};

/// A provider call recorded for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Session,
    TrackDetail(u64),
    Lyrics(u64),
    StreamInfo(u64),
    PlaylistInfo(u64),
    PlaylistTracks(u64),
    Account,
    Artwork(String),
    Download(String),
}

/// Mock implementation of the SourceProvider trait.
///
/// Serves whatever has been registered with the `add_*`/`set_*` methods and
/// answers `NotFound` for everything else. Downloads write deterministic
/// bytes to the destination so callers can check sizes.
///
/// # Example
///
/// ```rust,ignore
/// use cloudtune_core::testing::{fixtures, MockProvider};
///
/// let provider = MockProvider::new();
/// provider.add_track(fixtures::track(1, "Song", "Artist")).await;
/// provider.add_stream_info(fixtures::stream_info(1, false)).await;
///
/// // Fail the first two download attempts of track 1
/// provider.fail_downloads(&fixtures::stream_url(1), 2).await;
/// ```
#[derive(Debug, Default)]
pub struct MockProvider {
    session: Arc<RwLock<Option<Session>>>,
    tracks: Arc<RwLock<HashMap<u64, Track>>>,
    lyrics: Arc<RwLock<HashMap<u64, String>>>,
    stream_infos: Arc<RwLock<HashMap<u64, AudioStreamInfo>>>,
    playlists: Arc<RwLock<HashMap<u64, (PlaylistInfo, Vec<PlaylistEntry>)>>>,
    account_playlists: Arc<RwLock<Vec<PlaylistEntry>>>,
    audio: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    /// Remaining failures per download URL.
    download_failures: Arc<RwLock<HashMap<String, u32>>>,
    failing_artwork: Arc<RwLock<HashSet<String>>>,
    failing_tracks: Arc<RwLock<HashSet<u64>>>,
    calls: Arc<RwLock<Vec<ProviderCall>>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<ProviderError>>>,
}

impl MockProvider {
    /// Create a new mock provider with nothing registered and no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the mock in as the given account.
    pub async fn set_session(&self, user_id: u64, nickname: &str) {
        *self.session.write().await = Some(Session {
            user_id,
            nickname: nickname.to_string(),
        });
    }

    pub async fn add_track(&self, track: Track) {
        self.tracks.write().await.insert(track.id, track);
    }

    pub async fn set_lyrics(&self, track_id: u64, text: &str) {
        self.lyrics.write().await.insert(track_id, text.to_string());
    }

    pub async fn add_stream_info(&self, info: AudioStreamInfo) {
        self.stream_infos.write().await.insert(info.id, info);
    }

    /// Register a playlist and its track list.
    pub async fn add_playlist(&self, info: PlaylistInfo, tracks: Vec<PlaylistEntry>) {
        self.playlists.write().await.insert(info.id, (info, tracks));
    }

    /// Add a playlist to the logged-in account's list.
    pub async fn add_account_playlist(&self, id: u64, name: &str) {
        self.account_playlists.write().await.push(PlaylistEntry {
            id,
            name: name.to_string(),
        });
    }

    /// Set the bytes served for a download URL.
    pub async fn set_audio(&self, url: &str, bytes: Vec<u8>) {
        self.audio.write().await.insert(url.to_string(), bytes);
    }

    /// Fail the next `times` downloads of `url`. `u32::MAX` fails forever.
    pub async fn fail_downloads(&self, url: &str, times: u32) {
        self.download_failures
            .write()
            .await
            .insert(url.to_string(), times);
    }

    pub async fn fail_artwork(&self, url: &str) {
        self.failing_artwork.write().await.insert(url.to_string());
    }

    /// Make detail and stream-info lookups for a track fail.
    pub async fn fail_track(&self, track_id: u64) {
        self.failing_tracks.write().await.insert(track_id);
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: ProviderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<ProviderCall> {
        self.calls.read().await.clone()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Number of recorded calls matching `predicate`.
    pub async fn count_calls(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
        self.calls.read().await.iter().filter(|c| predicate(c)).count()
    }

    /// Bytes served for a download URL when none were set.
    pub fn default_audio(url: &str) -> Vec<u8> {
        format!("mock-audio:{}", url).into_bytes()
    }

    /// Records the call and returns the pending error, if any.
    async fn record(&self, call: ProviderCall) -> Result<(), ProviderError> {
        self.calls.write().await.push(call);
        match self.next_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn check_track(&self, track_id: u64) -> Result<(), ProviderError> {
        if self.failing_tracks.read().await.contains(&track_id) {
            return Err(ProviderError::api(-460, format!("mock failure for {}", track_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn acquire_session(&self) -> Result<Session, ProviderError> {
        self.record(ProviderCall::Session).await?;
        self.session
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotLoggedIn)
    }

    async fn fetch_track_detail(&self, track_id: u64) -> Result<Track, ProviderError> {
        self.record(ProviderCall::TrackDetail(track_id)).await?;
        self.check_track(track_id).await?;
        self.tracks
            .read()
            .await
            .get(&track_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("track {}", track_id)))
    }

    async fn fetch_lyrics(&self, track_id: u64) -> Result<Lyrics, ProviderError> {
        self.record(ProviderCall::Lyrics(track_id)).await?;
        let text = self
            .lyrics
            .read()
            .await
            .get(&track_id)
            .cloned()
            .unwrap_or_default();
        Ok(Lyrics {
            raw: json!({"code": 200, "lrc": {"version": 1, "lyric": text}}),
            text,
        })
    }

    async fn fetch_audio_stream_info(
        &self,
        track_id: u64,
    ) -> Result<AudioStreamInfo, ProviderError> {
        self.record(ProviderCall::StreamInfo(track_id)).await?;
        self.check_track(track_id).await?;
        self.stream_infos
            .read()
            .await
            .get(&track_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("stream info for {}", track_id)))
    }

    async fn fetch_playlist_info(&self, playlist_id: u64) -> Result<PlaylistInfo, ProviderError> {
        self.record(ProviderCall::PlaylistInfo(playlist_id)).await?;
        self.playlists
            .read()
            .await
            .get(&playlist_id)
            .map(|(info, _)| info.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("playlist {}", playlist_id)))
    }

    async fn fetch_playlist_track_ids(
        &self,
        playlist_id: u64,
    ) -> Result<Vec<PlaylistEntry>, ProviderError> {
        self.record(ProviderCall::PlaylistTracks(playlist_id)).await?;
        self.playlists
            .read()
            .await
            .get(&playlist_id)
            .map(|(_, tracks)| tracks.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("playlist {}", playlist_id)))
    }

    async fn fetch_account(&self) -> Result<AccountSnapshot, ProviderError> {
        self.record(ProviderCall::Account).await?;
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotLoggedIn)?;
        Ok(AccountSnapshot {
            user_id: session.user_id,
            name: session.nickname,
            playlists: self.account_playlists.read().await.clone(),
        })
    }

    async fn fetch_artwork(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.record(ProviderCall::Artwork(url.to_string())).await?;
        if self.failing_artwork.read().await.contains(url) {
            return Err(ProviderError::api(503, "mock artwork failure"));
        }
        Ok(format!("mock-artwork:{}", url).into_bytes())
    }

    async fn download_audio(&self, url: &str, dest: &Path) -> Result<u64, ProviderError> {
        self.record(ProviderCall::Download(url.to_string())).await?;

        {
            let mut failures = self.download_failures.write().await;
            if let Some(remaining) = failures.get_mut(url) {
                if *remaining > 0 {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    return Err(ProviderError::api(503, "mock download failure"));
                }
            }
        }

        let bytes = self
            .audio
            .read()
            .await
            .get(url)
            .cloned()
            .unwrap_or_else(|| Self::default_audio(url));
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}
