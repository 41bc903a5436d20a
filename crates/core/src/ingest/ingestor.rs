//! Catalog ingestion: track details, playlists and the account.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AccountReport, IngestError, PullOptions, PullReport};
use crate::catalog::{dedup_ids, CatalogStore, ExtraFields, Playlist, Track, User};
use crate::config::DownloadConfig;
use crate::layout::LibraryLayout;
use crate::provider::SourceProvider;

/// Plain-space playlist name.
pub fn normalize_playlist_name(name: &str) -> String {
    name.replace('\u{a0}', " ")
}

/// Pulls provider data into the catalog and the raw download directory.
pub struct Ingestor {
    pub(super) provider: Arc<dyn SourceProvider>,
    pub(super) layout: LibraryLayout,
    pub(super) download_attempts: u32,
    cancel: CancellationToken,
}

impl Ingestor {
    pub fn new(
        provider: Arc<dyn SourceProvider>,
        layout: LibraryLayout,
        config: &DownloadConfig,
    ) -> Self {
        Self {
            provider,
            layout,
            download_attempts: config.attempts.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn layout(&self) -> &LibraryLayout {
        &self.layout
    }

    fn check_cancelled(&self) -> Result<(), IngestError> {
        if self.cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        Ok(())
    }

    /// Returns the catalog copy of a track, fetching it when missing or when
    /// `update` is set.
    pub async fn fetch_track(
        &self,
        store: &mut CatalogStore,
        track_id: u64,
        update: bool,
    ) -> Result<Track, IngestError> {
        if !update {
            if let Some(track) = store.track(track_id) {
                return Ok(track.clone());
            }
        }

        let track = self.provider.fetch_track_detail(track_id).await?;
        debug!("Fetched details: {} - {}", track.id, track.std_name(false));
        store.upsert_track(track.clone());
        Ok(track)
    }

    /// Pulls a playlist and the details of its tracks, downloading audio
    /// when requested.
    ///
    /// The playlist is upserted before its tracks are processed, so a
    /// cancelled pull still leaves the new track list in the catalog.
    pub async fn pull_playlist(
        &self,
        store: &mut CatalogStore,
        playlist_id: u64,
        options: &PullOptions,
    ) -> Result<PullReport, IngestError> {
        self.check_cancelled()?;

        let info = self.provider.fetch_playlist_info(playlist_id).await?;
        let entries = self.provider.fetch_playlist_track_ids(playlist_id).await?;
        let name = normalize_playlist_name(&info.name);
        let music_ids: Vec<u64> = entries.iter().map(|e| e.id).collect();
        let track_ids = dedup_ids(&music_ids);

        let extra = store
            .playlist(playlist_id)
            .map(|p| p.extra.clone())
            .unwrap_or_else(ExtraFields::new);
        store.upsert_playlist(Playlist {
            id: playlist_id,
            name: name.clone(),
            description: info.description,
            create_time: info.create_time,
            music_ids,
            extra,
        });
        info!(
            "Pulled playlist: {} - {} ({} tracks)",
            playlist_id,
            name,
            track_ids.len()
        );

        let mut report = PullReport::new(playlist_id, name);
        report.tracks = track_ids.len();

        for track_id in track_ids {
            self.check_cancelled()?;

            match self
                .fetch_track(store, track_id, options.update_details)
                .await
            {
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to get details of {}: {}", track_id, e);
                    report.failed_details.push(track_id);
                }
            }

            if options.download {
                match self.download_track(track_id).await {
                    Ok(outcome) => report.record_download(track_id, outcome),
                    Err(e) => {
                        warn!("Failed to download {}: {}", track_id, e);
                        report.failed_downloads.push(track_id);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Pulls the logged-in account and every one of its playlists.
    ///
    /// The catalog is saved after the user record and after each playlist.
    pub async fn pull_account(
        &self,
        store: &mut CatalogStore,
        options: &PullOptions,
    ) -> Result<AccountReport, IngestError> {
        let account = self.provider.fetch_account().await?;
        let extra = store
            .user(account.user_id)
            .map(|u| u.extra.clone())
            .unwrap_or_else(ExtraFields::new);
        store.upsert_user(User {
            id: account.user_id,
            name: account.name.clone(),
            playlists: account.playlists.iter().map(|p| p.id).collect(),
            extra,
        });
        store.save()?;
        info!(
            "Pulled account: {} - {} ({} playlists)",
            account.user_id,
            account.name,
            account.playlists.len()
        );

        let mut report = AccountReport {
            user_id: account.user_id,
            name: account.name,
            ..Default::default()
        };

        for entry in &account.playlists {
            self.check_cancelled()?;
            info!("Pulling playlist: {} - {}", entry.id, entry.name);

            match self.pull_playlist(store, entry.id, options).await {
                Ok(pulled) => report.playlists.push(pulled),
                Err(IngestError::Cancelled) => {
                    store.save()?;
                    return Err(IngestError::Cancelled);
                }
                Err(e) => {
                    warn!("Failed to pull playlist {}: {}", entry.id, e);
                    report.failed_playlists.push(entry.id);
                }
            }
            store.save()?;
        }

        Ok(report)
    }
}
