//! Raw audio downloads.

use tracing::{debug, info, warn};

use super::ingestor::Ingestor;
use super::{DownloadOutcome, IngestError};
use crate::layout::{read_cache_json, write_cache_json};
use crate::provider::AudioStreamInfo;

/// Whether an existing download is kept when the provider reports `new`
/// stream info for a track last downloaded with `old`.
///
/// Kept when the download was unrestricted and the track has since become
/// restricted (the old file is the better one), or when the eligibility
/// marker has not changed.
pub fn should_skip_download(old: &AudioStreamInfo, new: &AudioStreamInfo) -> bool {
    (!old.is_restricted() && new.is_restricted()) || old.free_trial_info == new.free_trial_info
}

impl Ingestor {
    /// Downloads the raw audio of a track unless the current download is
    /// still the best available.
    ///
    /// The stream info cache is only written after a successful download, so
    /// a failed refresh is retried on the next run.
    pub async fn download_track(&self, track_id: u64) -> Result<DownloadOutcome, IngestError> {
        let info = self.provider.fetch_audio_stream_info(track_id).await?;
        let raw_path = self.layout.raw_path(track_id);
        let info_path = self.layout.info_path(track_id);

        if raw_path.is_file() {
            if let Some(old) = read_cache_json::<AudioStreamInfo>(&info_path).await {
                if should_skip_download(&old, &info) {
                    debug!("Track {} already downloaded", track_id);
                    return Ok(DownloadOutcome::AlreadyUpToDate);
                }
            }
        }

        let Some(url) = info.url.as_deref() else {
            warn!("Track {} has no download URL, skipping", track_id);
            return Ok(DownloadOutcome::Unavailable);
        };

        for attempt in 1..=self.download_attempts {
            match self.provider.download_audio(url, &raw_path).await {
                Ok(bytes) => {
                    write_cache_json(&info_path, &info).await?;
                    info!(
                        "Downloaded: {} -> {} ({} bytes)",
                        track_id,
                        self.layout.display_path(&raw_path),
                        bytes
                    );
                    return Ok(DownloadOutcome::Downloaded { bytes });
                }
                Err(e) => {
                    warn!(
                        "Download of {} failed (attempt {}/{}): {}",
                        track_id, attempt, self.download_attempts, e
                    );
                    if attempt < self.download_attempts {
                        info!("Retrying download of {}", track_id);
                    }
                }
            }
        }

        warn!(
            "Failed to download {} after {} attempts: {}",
            track_id, self.download_attempts, url
        );
        Ok(DownloadOutcome::Failed {
            attempts: self.download_attempts,
        })
    }
}
