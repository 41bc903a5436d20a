//! Types for the ingest module.

use serde::Serialize;

/// What pulling a playlist should do besides updating the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Download raw audio for every track.
    pub download: bool,
    /// Refetch details of tracks that are already in the catalog.
    pub update_details: bool,
}

/// Result of a raw download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Downloaded { bytes: u64 },
    /// The existing download matches what the provider offers.
    AlreadyUpToDate,
    /// The provider offers no download URL.
    Unavailable,
    /// Every attempt failed.
    Failed { attempts: u32 },
}

/// Result of pulling one playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    pub playlist_id: u64,
    pub name: String,
    /// Distinct tracks in the playlist.
    pub tracks: usize,
    /// Tracks whose details could not be fetched.
    pub failed_details: Vec<u64>,
    pub downloaded: usize,
    pub up_to_date: usize,
    pub unavailable: Vec<u64>,
    pub failed_downloads: Vec<u64>,
}

impl PullReport {
    pub fn new(playlist_id: u64, name: impl Into<String>) -> Self {
        Self {
            playlist_id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn record_download(&mut self, track_id: u64, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded { .. } => self.downloaded += 1,
            DownloadOutcome::AlreadyUpToDate => self.up_to_date += 1,
            DownloadOutcome::Unavailable => self.unavailable.push(track_id),
            DownloadOutcome::Failed { .. } => self.failed_downloads.push(track_id),
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failed_details.len() + self.failed_downloads.len()
    }
}

/// Result of pulling every playlist of the logged-in account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    pub user_id: u64,
    pub name: String,
    pub playlists: Vec<PullReport>,
    /// Playlists that could not be pulled at all.
    pub failed_playlists: Vec<u64>,
}
