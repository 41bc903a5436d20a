//! On-disk layout of the local library.
//!
//! ```text
//! <base>/musics/<id>.mp3        raw downloads
//! <base>/infos/<id>.json        cached audio stream info (eligibility marker)
//! <base>/lyrics/<id>.json       cached lyrics responses
//! <base>/dist/<destination>/    built, tagged copies
//! <base>/{musics,playlists,users}.json   catalog
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extension of raw and built audio files.
pub const AUDIO_EXTENSION: &str = "mp3";

/// Resolves every path the library reads or writes.
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    base_dir: PathBuf,
}

impl LibraryLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the three catalog files.
    pub fn catalog_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn musics_dir(&self) -> PathBuf {
        self.base_dir.join("musics")
    }

    pub fn infos_dir(&self) -> PathBuf {
        self.base_dir.join("infos")
    }

    pub fn lyrics_dir(&self) -> PathBuf {
        self.base_dir.join("lyrics")
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.base_dir.join("dist")
    }

    /// File name of a track's audio, derived from its identifier only.
    pub fn audio_file_name(track_id: u64) -> String {
        format!("{}.{}", track_id, AUDIO_EXTENSION)
    }

    pub fn raw_path(&self, track_id: u64) -> PathBuf {
        self.musics_dir().join(Self::audio_file_name(track_id))
    }

    pub fn info_path(&self, track_id: u64) -> PathBuf {
        self.infos_dir().join(format!("{}.json", track_id))
    }

    pub fn lyrics_path(&self, track_id: u64) -> PathBuf {
        self.lyrics_dir().join(format!("{}.json", track_id))
    }

    pub fn destination_dir(&self, destination: &str) -> PathBuf {
        self.dist_dir().join(destination)
    }

    pub fn dist_path(&self, destination: &str, track_id: u64) -> PathBuf {
        self.destination_dir(destination)
            .join(Self::audio_file_name(track_id))
    }

    /// Creates every library directory that does not exist yet.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.base_dir.clone(),
            self.musics_dir(),
            self.infos_dir(),
            self.lyrics_dir(),
            self.dist_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Path relative to the library root, for log lines.
    pub fn display_path<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        path.strip_prefix(&self.base_dir)
            .unwrap_or(path)
            .to_string_lossy()
    }
}

/// Writes a cache file as four-space indented JSON, creating its directory.
pub async fn write_cache_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(std::io::Error::other)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, buf).await
}

/// Reads a cache file written by [`write_cache_json`].
///
/// A missing or unreadable cache is `None`; the caller refetches.
pub async fn read_cache_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_use_identifier_only() {
        let layout = LibraryLayout::new("/lib");
        assert_eq!(layout.raw_path(42), PathBuf::from("/lib/musics/42.mp3"));
        assert_eq!(layout.info_path(42), PathBuf::from("/lib/infos/42.json"));
        assert_eq!(layout.lyrics_path(42), PathBuf::from("/lib/lyrics/42.json"));
        assert_eq!(
            layout.dist_path("7001", 42),
            PathBuf::from("/lib/dist/7001/42.mp3")
        );
    }

    #[test]
    fn test_display_path_is_relative() {
        let layout = LibraryLayout::new("/lib");
        let path = layout.dist_path("7001", 42);
        assert_eq!(layout.display_path(&path), "dist/7001/42.mp3");
    }

    #[tokio::test]
    async fn test_ensure_dirs() {
        let temp = TempDir::new().unwrap();
        let layout = LibraryLayout::new(temp.path().join("library"));
        layout.ensure_dirs().await.unwrap();

        assert!(layout.musics_dir().is_dir());
        assert!(layout.infos_dir().is_dir());
        assert!(layout.lyrics_dir().is_dir());
        assert!(layout.dist_dir().is_dir());

        // Idempotent
        layout.ensure_dirs().await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_json() {
        let temp = TempDir::new().unwrap();
        let layout = LibraryLayout::new(temp.path());
        let path = layout.info_path(7);

        assert!(read_cache_json::<serde_json::Value>(&path).await.is_none());

        let value = serde_json::json!({"id": 7, "name": "夜曲"});
        write_cache_json(&path, &value).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n    \"id\": 7"));
        assert!(written.contains("夜曲"));

        let read: serde_json::Value = read_cache_json(&path).await.unwrap();
        assert_eq!(read, value);

        std::fs::write(&path, "{ broken").unwrap();
        assert!(read_cache_json::<serde_json::Value>(&path).await.is_none());
    }
}
