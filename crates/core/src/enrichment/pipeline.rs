//! Destination builds.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BuildError, BuildOptions, BuildReport};
use crate::catalog::{CatalogStore, Track};
use crate::layout::{write_cache_json, LibraryLayout};
use crate::provider::SourceProvider;
use crate::reconcile::{self, ActualEntry};
use crate::tagger::{TagEditor, TagUpdate};

/// Builds destination directories from raw downloads.
pub struct BuildPipeline {
    layout: LibraryLayout,
    provider: Arc<dyn SourceProvider>,
    tagger: Arc<dyn TagEditor>,
    cancel: CancellationToken,
}

impl BuildPipeline {
    pub fn new(
        layout: LibraryLayout,
        provider: Arc<dyn SourceProvider>,
        tagger: Arc<dyn TagEditor>,
    ) -> Self {
        Self {
            layout,
            provider,
            tagger,
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

    /// Builds a playlist into the destination named after its id.
    ///
    /// Playlist entries missing from the catalog are skipped with a warning.
    pub async fn build_playlist(
        &self,
        store: &CatalogStore,
        playlist_id: u64,
        options: &BuildOptions,
    ) -> Result<BuildReport, BuildError> {
        let playlist = store
            .playlist(playlist_id)
            .ok_or(BuildError::PlaylistNotFound(playlist_id))?;
        let resolved = store.resolve_playlist_tracks(playlist);
        for id in &resolved.missing {
            warn!(
                "Track {} of playlist {} is not in the catalog, skipping",
                id, playlist_id
            );
        }

        self.build(&resolved.tracks, &playlist_id.to_string(), options)
            .await
    }

    /// Builds `tracks` into `dist/<destination>/` and removes every other
    /// file from it.
    ///
    /// Running it again with the same input changes nothing on disk and
    /// fetches nothing unless a refresh is forced.
    pub async fn build(
        &self,
        tracks: &[Track],
        destination: &str,
        options: &BuildOptions,
    ) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::new(destination);
        let mut desired: BTreeMap<String, ()> = BTreeMap::new();
        let mut seen = HashSet::new();

        for track in tracks.iter().filter(|t| seen.insert(t.id)) {
            if self.cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }

            let raw_path = self.layout.raw_path(track.id);
            if !raw_path.is_file() {
                warn!(
                    "Track {} not downloaded ({}), skipping",
                    track.id,
                    self.layout.display_path(&raw_path)
                );
                report.skipped.push(track.id);
                continue;
            }

            self.build_track(track, destination, options, &mut report)
                .await?;
            desired.insert(LibraryLayout::audio_file_name(track.id), ());
            report.built.push(track.id);
        }

        report.removed = self.cleanup(destination, &desired).await?;
        Ok(report)
    }

    async fn build_track(
        &self,
        track: &Track,
        destination: &str,
        options: &BuildOptions,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        let dist_path = self.layout.dist_path(destination, track.id);
        info!(
            "Building: {} -> {}",
            track.id,
            self.layout.display_path(&dist_path)
        );

        let raw_path = self.layout.raw_path(track.id);
        if needs_copy(&raw_path, &dist_path).await? {
            if let Some(parent) = dist_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            copy_atomic(&raw_path, &dist_path).await?;
            report.copied += 1;
        }

        let state = self.tagger.inspect(&dist_path).await?;
        let mut update = TagUpdate {
            title: track.name.clone(),
            artist: track.artist(),
            album: track.album().to_string(),
            year: track.year().and_then(|y| u32::try_from(y).ok()),
            lyrics: None,
            artwork: None,
        };

        if options.pull_lyrics && (options.force_lyrics_refresh || !state.has_lyrics) {
            let lyrics = self
                .provider
                .fetch_lyrics(track.id)
                .await
                .map_err(|e| BuildError::enrichment(track.id, "lyrics", e))?;
            write_cache_json(&self.layout.lyrics_path(track.id), &lyrics.raw).await?;
            report.lyrics_fetched += 1;
            if lyrics.text.trim().is_empty() {
                debug!("Track {} has no lyrics", track.id);
            } else {
                update.lyrics = Some(lyrics.text);
            }
        }

        if options.force_artwork_refresh || !state.has_artwork {
            match track.album_pic_url() {
                Some(url) => {
                    let artwork = self
                        .provider
                        .fetch_artwork(url)
                        .await
                        .map_err(|e| BuildError::enrichment(track.id, "artwork", e))?;
                    update.artwork = Some(artwork);
                    report.artwork_fetched += 1;
                }
                None => debug!("Track {} has no cover art", track.id),
            }
        }

        self.tagger.apply(&dist_path, update).await?;
        Ok(())
    }

    /// Deletes files of the destination that were not built this run.
    async fn cleanup(
        &self,
        destination: &str,
        desired: &BTreeMap<String, ()>,
    ) -> Result<Vec<String>, BuildError> {
        let dir = self.layout.destination_dir(destination);
        let mut actual = Vec::new();
        match fs::read_dir(&dir).await {
            Ok(mut reader) => {
                while let Some(entry) = reader.next_entry().await? {
                    if entry.file_type().await?.is_file() {
                        actual.push(ActualEntry::new(
                            entry.file_name().to_string_lossy().to_string(),
                            None,
                        ));
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let diff = reconcile::diff(desired, &actual, |_, _| true);
        for name in &diff.to_remove {
            let path = dir.join(name);
            info!("Removing: {}", self.layout.display_path(&path));
            fs::remove_file(&path).await?;
        }
        Ok(diff.to_remove)
    }
}

/// A destination copy is stale when it is missing or older than the raw
/// download it came from.
async fn needs_copy(raw: &Path, dist: &Path) -> Result<bool, BuildError> {
    let dist_meta = match fs::metadata(dist).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    let raw_meta = fs::metadata(raw).await?;
    match (raw_meta.modified(), dist_meta.modified()) {
        (Ok(raw_time), Ok(dist_time)) if raw_time > dist_time => {
            info!("Raw download is newer, copying {} again", raw.display());
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Copies next to `dest` first so an interrupted copy never takes its place.
async fn copy_atomic(src: &Path, dest: &Path) -> Result<(), BuildError> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let partial = dest.with_file_name(format!(".{}.part", file_name));

    let result = match fs::copy(src, &partial).await {
        Ok(_) => fs::rename(&partial, dest).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockProvider, MockTagEditor, ProviderCall};
    use crate::tagger::TagState;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        layout: LibraryLayout,
        provider: Arc<MockProvider>,
        tagger: Arc<MockTagEditor>,
        pipeline: BuildPipeline,
    }

    fn setup() -> Fixture {
        let temp = TempDir::new().unwrap();
        let layout = LibraryLayout::new(temp.path());
        let provider = Arc::new(MockProvider::new());
        let tagger = Arc::new(MockTagEditor::new());
        let pipeline = BuildPipeline::new(layout.clone(), provider.clone(), tagger.clone());
        Fixture {
            _temp: temp,
            layout,
            provider,
            tagger,
            pipeline,
        }
    }

    fn download(layout: &LibraryLayout, id: u64) {
        let path = layout.raw_path(id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("raw-{}", id)).unwrap();
    }

    #[tokio::test]
    async fn test_build_copies_and_tags() {
        let f = setup();
        download(&f.layout, 1);
        let track = fixtures::track(1, "Song", "Artist");

        let report = f
            .pipeline
            .build(&[track], "dest", &BuildOptions::default())
            .await
            .unwrap();
        assert_eq!(report.built, vec![1]);
        assert_eq!(report.copied, 1);
        assert_eq!(report.artwork_fetched, 1);
        assert_eq!(report.lyrics_fetched, 0);

        let dist = f.layout.dist_path("dest", 1);
        assert_eq!(std::fs::read_to_string(&dist).unwrap(), "raw-1");

        let applies = f.tagger.recorded_applies().await;
        assert_eq!(applies.len(), 1);
        assert_eq!(applies[0].update.title, "Song");
        assert_eq!(applies[0].update.artist, "Artist");
        assert_eq!(applies[0].update.year, Some(2020));
        assert!(applies[0].update.artwork.is_some());
    }

    fn dest_entries(layout: &LibraryLayout, destination: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(layout.destination_dir(destination))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_copy_leaves_no_partial_file() {
        let f = setup();
        download(&f.layout, 1);
        // Left over from an interrupted copy of another track
        let leftover = f.layout.destination_dir("d").join(".2.mp3.part");
        std::fs::create_dir_all(leftover.parent().unwrap()).unwrap();
        std::fs::write(&leftover, "raw-").unwrap();

        let report = f
            .pipeline
            .build(&[fixtures::track(1, "A", "X")], "d", &BuildOptions::default())
            .await
            .unwrap();
        assert_eq!(report.copied, 1);
        assert_eq!(report.removed, vec![".2.mp3.part".to_string()]);
        assert_eq!(dest_entries(&f.layout, "d"), vec!["1.mp3".to_string()]);
        assert_eq!(
            std::fs::read_to_string(f.layout.dist_path("d", 1)).unwrap(),
            "raw-1"
        );
    }

    #[tokio::test]
    async fn test_newer_raw_download_is_copied_again() {
        let f = setup();
        download(&f.layout, 1);
        let tracks = vec![fixtures::track(1, "A", "X")];

        let report = f
            .pipeline
            .build(&tracks, "d", &BuildOptions::default())
            .await
            .unwrap();
        assert_eq!(report.copied, 1);

        // Unchanged raw file: the destination copy stays
        let report = f
            .pipeline
            .build(&tracks, "d", &BuildOptions::default())
            .await
            .unwrap();
        assert_eq!(report.copied, 0);

        let raw = f.layout.raw_path(1);
        std::fs::write(&raw, "raw-1-redownloaded").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&raw)
            .unwrap()
            .set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(60))
            .unwrap();

        let report = f
            .pipeline
            .build(&tracks, "d", &BuildOptions::default())
            .await
            .unwrap();
        assert_eq!(report.copied, 1);
        assert_eq!(
            std::fs::read_to_string(f.layout.dist_path("d", 1)).unwrap(),
            "raw-1-redownloaded"
        );
        assert_eq!(dest_entries(&f.layout, "d"), vec!["1.mp3".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_raw_is_skipped() {
        let f = setup();
        download(&f.layout, 1);
        let tracks = vec![
            fixtures::track(1, "A", "X"),
            fixtures::track(2, "B", "Y"),
        ];

        let report = f
            .pipeline
            .build(&tracks, "dest", &BuildOptions::default())
            .await
            .unwrap();
        assert_eq!(report.built, vec![1]);
        assert_eq!(report.skipped, vec![2]);
        assert!(!f.layout.dist_path("dest", 2).exists());
    }

    #[tokio::test]
    async fn test_lyrics_only_when_requested_and_missing() {
        let f = setup();
        download(&f.layout, 1);
        f.provider.set_lyrics(1, "[00:01.00]la").await;
        let tracks = vec![fixtures::track(1, "A", "X")];
        let options = BuildOptions {
            pull_lyrics: true,
            ..Default::default()
        };

        let report = f.pipeline.build(&tracks, "d", &options).await.unwrap();
        assert_eq!(report.lyrics_fetched, 1);
        assert!(f.layout.lyrics_path(1).is_file());

        // Tag now has lyrics: nothing to fetch
        let report = f.pipeline.build(&tracks, "d", &options).await.unwrap();
        assert_eq!(report.lyrics_fetched, 0);

        let forced = BuildOptions {
            pull_lyrics: true,
            force_lyrics_refresh: true,
            ..Default::default()
        };
        let report = f.pipeline.build(&tracks, "d", &forced).await.unwrap();
        assert_eq!(report.lyrics_fetched, 1);
    }

    #[tokio::test]
    async fn test_existing_artwork_not_refetched_unless_forced() {
        let f = setup();
        download(&f.layout, 1);
        let dist = f.layout.dist_path("d", 1);
        std::fs::create_dir_all(dist.parent().unwrap()).unwrap();
        std::fs::write(&dist, "already built").unwrap();
        f.tagger
            .set_state(
                &dist,
                TagState {
                    has_artwork: true,
                    ..Default::default()
                },
            )
            .await;
        let tracks = vec![fixtures::track(1, "A", "X")];

        let report = f
            .pipeline
            .build(&tracks, "d", &BuildOptions::default())
            .await
            .unwrap();
        assert_eq!(report.copied, 0);
        assert_eq!(report.artwork_fetched, 0);
        // Existing copy is kept as-is
        assert_eq!(std::fs::read_to_string(&dist).unwrap(), "already built");

        let forced = BuildOptions {
            force_artwork_refresh: true,
            ..Default::default()
        };
        let report = f.pipeline.build(&tracks, "d", &forced).await.unwrap();
        assert_eq!(report.artwork_fetched, 1);
    }

    #[tokio::test]
    async fn test_enrichment_failure_aborts() {
        let f = setup();
        download(&f.layout, 1);
        let track = fixtures::track(1, "A", "X");
        f.provider.fail_artwork(&fixtures::artwork_url(1)).await;

        let result = f
            .pipeline
            .build(&[track], "d", &BuildOptions::default())
            .await;
        assert!(matches!(
            result,
            Err(BuildError::Enrichment {
                track_id: 1,
                what: "artwork",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_tag_failure_aborts() {
        let f = setup();
        download(&f.layout, 1);
        f.tagger
            .set_next_error(crate::tagger::TaggerError::Read {
                path: f.layout.dist_path("d", 1),
                reason: "corrupt".to_string(),
            })
            .await;

        let result = f
            .pipeline
            .build(&[fixtures::track(1, "A", "X")], "d", &BuildOptions::default())
            .await;
        assert!(matches!(result, Err(BuildError::Tag(_))));
    }

    #[tokio::test]
    async fn test_cancelled_build_skips_cleanup() {
        let f = setup();
        let stale = f.layout.dist_path("d", 99);
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "stale").unwrap();
        download(&f.layout, 1);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let pipeline = BuildPipeline::new(f.layout.clone(), f.provider.clone(), f.tagger.clone())
            .with_cancellation(cancel);

        let result = pipeline
            .build(&[fixtures::track(1, "A", "X")], "d", &BuildOptions::default())
            .await;
        assert!(matches!(result, Err(BuildError::Cancelled)));
        assert!(stale.exists());
        assert!(f.provider.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_build_playlist_unknown() {
        let f = setup();
        let store = CatalogStore::new(f.layout.catalog_dir());
        let result = f
            .pipeline
            .build_playlist(&store, 1, &BuildOptions::default())
            .await;
        assert!(matches!(result, Err(BuildError::PlaylistNotFound(1))));
    }

    #[tokio::test]
    async fn test_build_playlist_skips_unknown_tracks() {
        let f = setup();
        let mut store = CatalogStore::new(f.layout.catalog_dir());
        store.upsert_track(fixtures::track(1, "A", "X"));
        store.upsert_playlist(fixtures::playlist(7001, "P", &[1, 404]));
        download(&f.layout, 1);

        let report = f
            .pipeline
            .build_playlist(&store, 7001, &BuildOptions::default())
            .await
            .unwrap();
        assert_eq!(report.destination, "7001");
        assert_eq!(report.built, vec![1]);
        assert_eq!(
            f.provider
                .count_calls(|c| matches!(c, ProviderCall::Artwork(_)))
                .await,
            1
        );
    }
}
