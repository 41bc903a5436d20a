//! Catalog entities.
//!
//! Every entity keeps the provider fields it does not model in `extra`, so a
//! load/save round trip never drops data.

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Provider payload fields that are passed through unmodified.
pub type ExtraFields = Map<String, Value>;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An artist credit on a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// The album a track belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Cover art URL.
    #[serde(rename = "picUrl", default)]
    pub pic_url: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A single audio item with provider metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Artist credits, in provider order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ar: Vec<ArtistRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub al: AlbumRef,
    /// Publish time in milliseconds since the epoch.
    #[serde(rename = "publishTime", default, deserialize_with = "null_as_default")]
    pub publish_time: i64,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Track {
    /// Artist names joined with `" & "`.
    pub fn artist(&self) -> String {
        self.ar
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(" & ")
    }

    pub fn album(&self) -> &str {
        &self.al.name
    }

    pub fn album_pic_url(&self) -> Option<&str> {
        self.al.pic_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Publish year (UTC). `None` when the provider reported no publish time.
    pub fn year(&self) -> Option<i32> {
        if self.publish_time <= 0 {
            return None;
        }
        DateTime::from_timestamp_millis(self.publish_time).map(|dt| dt.year())
    }

    /// `"{artist} - {name}"`, or `"{name} - {artist}"` when reversed.
    pub fn std_name(&self, reversed: bool) -> String {
        if reversed {
            format!("{} - {}", self.name, self.artist())
        } else {
            format!("{} - {}", self.artist(), self.name)
        }
    }
}

/// An ordered collection of track references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Creation time in milliseconds since the epoch.
    #[serde(rename = "createTime", default, deserialize_with = "null_as_default")]
    pub create_time: i64,
    /// Track ids in playlist order. May contain duplicates and ids that are
    /// not in the catalog.
    #[serde(default, deserialize_with = "null_as_default")]
    pub music_ids: Vec<u64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A provider account and the order of its playlists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub playlists: Vec<u64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A persisted catalog file does not match the entity shapes.
    #[error("Catalog file is corrupt: {path}")]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Writing a catalog file failed; the previous file is left in place.
    #[error("Failed to persist catalog file: {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A query that cannot select anything (neither id nor name).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_track() -> Track {
        serde_json::from_value(json!({
            "id": 1974443814,
            "name": "Tape",
            "ar": [
                {"id": 1, "name": "Alpha", "tns": []},
                {"id": 2, "name": "Beta"}
            ],
            "al": {"id": 9, "name": "Cassette", "picUrl": "https://img.example/9.jpg"},
            "publishTime": 1_600_000_000_000i64,
            "fee": 8,
            "dt": 215000
        }))
        .unwrap()
    }

    #[test]
    fn test_derived_names() {
        let track = sample_track();
        assert_eq!(track.artist(), "Alpha & Beta");
        assert_eq!(track.album(), "Cassette");
        assert_eq!(track.std_name(false), "Alpha & Beta - Tape");
        assert_eq!(track.std_name(true), "Tape - Alpha & Beta");
        assert_eq!(track.album_pic_url(), Some("https://img.example/9.jpg"));
    }

    #[test]
    fn test_null_cover_url_round_trips() {
        let raw = json!({"name": "A", "picUrl": null, "type": "Single"});
        let album: AlbumRef = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(album.pic_url, None);
        assert_eq!(serde_json::to_value(&album).unwrap(), raw);
    }

    #[test]
    fn test_year_from_publish_time() {
        let mut track = sample_track();
        assert_eq!(track.year(), Some(2020));

        track.publish_time = 0;
        assert_eq!(track.year(), None);
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let track = sample_track();
        assert_eq!(track.extra.get("fee"), Some(&json!(8)));
        assert_eq!(track.ar[0].extra.get("tns"), Some(&json!([])));
        assert_eq!(track.al.extra.get("id"), Some(&json!(9)));

        let value = serde_json::to_value(&track).unwrap();
        assert_eq!(value["fee"], json!(8));
        assert_eq!(value["dt"], json!(215000));
        assert_eq!(value["al"]["id"], json!(9));
        assert_eq!(value["publishTime"], json!(1_600_000_000_000i64));

        let reparsed: Track = serde_json::from_value(value).unwrap();
        assert_eq!(reparsed, track);
    }

    #[test]
    fn test_null_fields_become_defaults() {
        let track: Track = serde_json::from_value(json!({
            "id": 5,
            "name": "Untitled",
            "ar": [{"id": 0, "name": null}],
            "al": null,
            "publishTime": null
        }))
        .unwrap();
        assert_eq!(track.artist(), "");
        assert_eq!(track.album(), "");
        assert_eq!(track.album_pic_url(), None);
        assert_eq!(track.year(), None);
    }

    #[test]
    fn test_playlist_fields() {
        let playlist: Playlist = serde_json::from_value(json!({
            "id": 7001,
            "name": "Road",
            "description": null,
            "createTime": 1_500_000_000_000i64,
            "music_ids": [5, 5, 7]
        }))
        .unwrap();
        assert_eq!(playlist.music_ids, vec![5, 5, 7]);
        assert!(playlist.description.is_none());
        assert_eq!(playlist.create_time, 1_500_000_000_000);
    }
}
