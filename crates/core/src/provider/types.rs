//! Types returned by source providers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ExtraFields;

/// The account a provider session is logged in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: u64,
    pub nickname: String,
}

/// Lyrics for a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Lyrics {
    /// Plain LRC text, empty when the track has none.
    pub text: String,
    /// The provider response as received, cached next to the library.
    pub raw: Value,
}

/// Download information for a track.
///
/// Cached as-is under `infos/`; the cached copy is compared with a fresh one
/// to decide whether a re-download is worthwhile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub id: u64,
    /// Download URL. Absent when the track cannot be downloaded at all.
    #[serde(default)]
    pub url: Option<String>,
    /// Eligibility marker: present when only a restricted preview is
    /// available, null when the full track is.
    #[serde(rename = "freeTrialInfo", default)]
    pub free_trial_info: Option<Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl AudioStreamInfo {
    /// Whether the provider only offers a restricted version of the track.
    pub fn is_restricted(&self) -> bool {
        self.free_trial_info.is_some()
    }
}

/// Playlist header fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "createTime", default)]
    pub create_time: i64,
}

/// A playlist reference as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// The logged-in account and its playlists, in account order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub user_id: u64,
    pub name: String,
    pub playlists: Vec<PlaylistEntry>,
}
