//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every collaborator trait,
//! so ingestion, builds and mirror syncs can be tested without a provider
//! server, real audio files or a remote store.
//!
//! # Example
//!
//! ```rust,ignore
//! use cloudtune_core::testing::{fixtures, MockProvider, MockRemoteTarget, MockTagEditor};
//!
//! let provider = MockProvider::new();
//! provider.add_track(fixtures::track(101, "Song", "Artist")).await;
//!
//! let tagger = MockTagEditor::new();
//! let mut target = MockRemoteTarget::new();
//! ```

mod mock_provider;
mod mock_remote_target;
mod mock_tag_editor;

pub use mock_provider::{MockProvider, ProviderCall};
pub use mock_remote_target::{MockRemoteTarget, RecordedPut};
pub use mock_tag_editor::{MockTagEditor, RecordedApply};

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::json;

    use crate::catalog::{AlbumRef, ArtistRef, ExtraFields, Playlist, Track, User};
    use crate::provider::{AudioStreamInfo, PlaylistEntry, PlaylistInfo};

    /// 2020-09-13, UTC.
    pub const PUBLISH_TIME_MS: i64 = 1_600_000_000_000;

    /// Create a test track with one artist and a cover URL.
    pub fn track(id: u64, name: &str, artist: &str) -> Track {
        Track {
            id,
            name: name.to_string(),
            ar: vec![ArtistRef {
                id: id * 10,
                name: artist.to_string(),
                extra: ExtraFields::new(),
            }],
            al: AlbumRef {
                name: format!("{} (Single)", name),
                pic_url: Some(artwork_url(id)),
                extra: ExtraFields::new(),
            },
            publish_time: PUBLISH_TIME_MS,
            extra: ExtraFields::new(),
        }
    }

    /// Create a test playlist referencing `music_ids` in order.
    pub fn playlist(id: u64, name: &str, music_ids: &[u64]) -> Playlist {
        Playlist {
            id,
            name: name.to_string(),
            description: None,
            create_time: PUBLISH_TIME_MS,
            music_ids: music_ids.to_vec(),
            extra: ExtraFields::new(),
        }
    }

    /// Create a test user owning `playlists` in order.
    pub fn user(id: u64, name: &str, playlists: &[u64]) -> User {
        User {
            id,
            name: name.to_string(),
            playlists: playlists.to_vec(),
            extra: ExtraFields::new(),
        }
    }

    pub fn artwork_url(track_id: u64) -> String {
        format!("https://img.example/{}.jpg", track_id)
    }

    pub fn stream_url(track_id: u64) -> String {
        format!("https://cdn.example/{}.mp3", track_id)
    }

    /// Create stream info for a downloadable track.
    ///
    /// A restricted track carries a preview window as eligibility marker.
    pub fn stream_info(track_id: u64, restricted: bool) -> AudioStreamInfo {
        let mut extra = ExtraFields::new();
        extra.insert("br".to_string(), json!(320000));
        AudioStreamInfo {
            id: track_id,
            url: Some(stream_url(track_id)),
            free_trial_info: restricted.then(|| json!({"start": 0, "end": 30})),
            extra,
        }
    }

    /// Create stream info for a track the provider will not serve.
    pub fn unavailable_stream_info(track_id: u64) -> AudioStreamInfo {
        AudioStreamInfo {
            id: track_id,
            url: None,
            free_trial_info: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn playlist_info(id: u64, name: &str) -> PlaylistInfo {
        PlaylistInfo {
            id,
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            create_time: PUBLISH_TIME_MS,
        }
    }

    /// Playlist entries for the given tracks, named after their ids.
    pub fn entries(ids: &[u64]) -> Vec<PlaylistEntry> {
        ids.iter()
            .map(|id| PlaylistEntry {
                id: *id,
                name: format!("Track {}", id),
            })
            .collect()
    }
}
