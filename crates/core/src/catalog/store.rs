//! JSON-file backed catalog store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{CatalogError, Playlist, Track, User};

const TRACKS_FILE: &str = "musics.json";
const PLAYLISTS_FILE: &str = "playlists.json";
const USERS_FILE: &str = "users.json";

/// In-memory catalog of tracks, playlists and users.
///
/// Loaded wholesale with [`CatalogStore::open`] and written back only when
/// [`CatalogStore::save`] is called. Each file is replaced atomically, so an
/// interrupted save leaves the previous snapshot readable.
///
/// Maps are keyed by the identifier's decimal string.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    dir: PathBuf,
    tracks: BTreeMap<String, Track>,
    playlists: BTreeMap<String, Playlist>,
    users: BTreeMap<String, User>,
}

impl CatalogStore {
    /// Creates an empty store that persists into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tracks: BTreeMap::new(),
            playlists: BTreeMap::new(),
            users: BTreeMap::new(),
        }
    }

    /// Opens the store in `dir`, loading whatever has been persisted there.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let mut store = Self::new(dir);
        store.load()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replaces the in-memory maps with the persisted ones.
    ///
    /// Missing files load as empty maps. Nothing is replaced unless all three
    /// files parse.
    pub fn load(&mut self) -> Result<(), CatalogError> {
        let tracks = read_map(&self.dir.join(TRACKS_FILE))?;
        let playlists = read_map(&self.dir.join(PLAYLISTS_FILE))?;
        let users = read_map(&self.dir.join(USERS_FILE))?;

        self.tracks = tracks;
        self.playlists = playlists;
        self.users = users;

        debug!(
            "Loaded catalog from {}: {} tracks, {} playlists, {} users",
            self.dir.display(),
            self.tracks.len(),
            self.playlists.len(),
            self.users.len()
        );
        Ok(())
    }

    /// Writes a snapshot of all three maps.
    pub fn save(&self) -> Result<(), CatalogError> {
        fs::create_dir_all(&self.dir).map_err(|e| CatalogError::Persist {
            path: self.dir.clone(),
            source: e,
        })?;

        write_map(&self.dir, TRACKS_FILE, &self.tracks)?;
        write_map(&self.dir, PLAYLISTS_FILE, &self.playlists)?;
        write_map(&self.dir, USERS_FILE, &self.users)?;

        debug!("Saved catalog to {}", self.dir.display());
        Ok(())
    }

    /// Inserts or replaces a track, returning the previous record.
    pub fn upsert_track(&mut self, track: Track) -> Option<Track> {
        self.tracks.insert(track.id.to_string(), track)
    }

    pub fn upsert_playlist(&mut self, playlist: Playlist) -> Option<Playlist> {
        self.playlists.insert(playlist.id.to_string(), playlist)
    }

    pub fn upsert_user(&mut self, user: User) -> Option<User> {
        self.users.insert(user.id.to_string(), user)
    }

    pub fn track(&self, id: u64) -> Option<&Track> {
        self.tracks.get(&id.to_string())
    }

    pub fn playlist(&self, id: u64) -> Option<&Playlist> {
        self.playlists.get(&id.to_string())
    }

    pub fn user(&self, id: u64) -> Option<&User> {
        self.users.get(&id.to_string())
    }

    /// First user whose display name matches exactly.
    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.values().find(|u| u.name == name)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn playlists(&self) -> impl Iterator<Item = &Playlist> {
        self.playlists.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn playlist_count(&self) -> usize {
        self.playlists.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

fn read_map<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>, CatalogError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| CatalogError::CorruptState {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_map<T: Serialize>(
    dir: &Path,
    file_name: &str,
    map: &BTreeMap<String, T>,
) -> Result<(), CatalogError> {
    let path = dir.join(file_name);
    let persist_err = |e: std::io::Error| CatalogError::Persist {
        path: path.clone(),
        source: e,
    };

    // Same directory as the target so the final rename never crosses filesystems
    let mut temp = NamedTempFile::new_in(dir).map_err(persist_err)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
        map.serialize(&mut serializer)
            .map_err(|e| persist_err(std::io::Error::other(e)))?;
        writer.write_all(b"\n").map_err(persist_err)?;
        writer.flush().map_err(persist_err)?;
    }
    temp.as_file().sync_all().map_err(persist_err)?;
    temp.persist(&path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_files_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = CatalogStore::open(temp.path()).unwrap();
        assert_eq!(store.track_count(), 0);
        assert_eq!(store.playlist_count(), 0);
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let mut store = CatalogStore::new(temp.path());
        store.upsert_track(fixtures::track(101, "First", "Alpha"));
        store.upsert_track(fixtures::track(102, "Second", "Beta"));
        store.upsert_playlist(fixtures::playlist(7001, "Road", &[101, 102]));
        store.upsert_user(fixtures::user(1, "me", &[7001]));
        store.save().unwrap();

        let reloaded = CatalogStore::open(temp.path()).unwrap();
        assert_eq!(reloaded.track_count(), 2);
        assert_eq!(reloaded.track(101).unwrap().name, "First");
        assert_eq!(reloaded.playlist(7001).unwrap().music_ids, vec![101, 102]);
        assert_eq!(reloaded.user(1).unwrap().playlists, vec![7001]);
    }

    #[test]
    fn test_save_is_deterministic_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let mut store = CatalogStore::new(temp.path());
        store.upsert_track(fixtures::track(2, "B", "Y"));
        store.upsert_track(fixtures::track(1, "A", "X"));
        store.save().unwrap();
        let first = fs::read_to_string(temp.path().join(TRACKS_FILE)).unwrap();

        store.save().unwrap();
        let second = fs::read_to_string(temp.path().join(TRACKS_FILE)).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("{\n    \"1\": {"));

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 3, "unexpected files: {:?}", names);
    }

    #[test]
    fn test_upsert_replaces_whole_record() {
        let temp = TempDir::new().unwrap();
        let mut store = CatalogStore::new(temp.path());
        let mut original = fixtures::track(5, "Old", "Alpha");
        original
            .extra
            .insert("fee".to_string(), serde_json::json!(8));
        store.upsert_track(original);

        let previous = store.upsert_track(fixtures::track(5, "New", "Beta"));
        assert_eq!(previous.unwrap().name, "Old");

        let current = store.track(5).unwrap();
        assert_eq!(current.name, "New");
        assert!(current.extra.get("fee").is_none());
    }

    #[test]
    fn test_unknown_fields_preserved_on_resave() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(TRACKS_FILE),
            r#"{"9": {"id": 9, "name": "N", "ar": [], "al": {"name": "A"}, "publishTime": 0, "mv": 123, "h": {"br": 320000}}}"#,
        )
        .unwrap();

        let store = CatalogStore::open(temp.path()).unwrap();
        store.save().unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(temp.path().join(TRACKS_FILE)).unwrap())
                .unwrap();
        assert_eq!(saved["9"]["mv"], 123);
        assert_eq!(saved["9"]["h"]["br"], 320000);
    }

    #[test]
    fn test_corrupt_file_fails_and_keeps_state() {
        let temp = TempDir::new().unwrap();
        let mut store = CatalogStore::new(temp.path());
        store.upsert_track(fixtures::track(1, "A", "X"));
        store.save().unwrap();

        fs::write(temp.path().join(PLAYLISTS_FILE), "{ not json").unwrap();

        let result = store.load();
        assert!(matches!(result, Err(CatalogError::CorruptState { .. })));
        // In-memory state untouched by the failed load
        assert_eq!(store.track_count(), 1);

        let result = CatalogStore::open(temp.path());
        assert!(matches!(result, Err(CatalogError::CorruptState { .. })));
    }

    #[test]
    fn test_wrong_shape_is_corrupt() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(USERS_FILE), r#"{"1": {"name": "no id"}}"#).unwrap();
        let result = CatalogStore::open(temp.path());
        assert!(matches!(result, Err(CatalogError::CorruptState { .. })));
    }

    #[test]
    fn test_user_by_name_is_explicitly_absent() {
        let temp = TempDir::new().unwrap();
        let mut store = CatalogStore::new(temp.path());
        store.upsert_user(fixtures::user(1, "me", &[]));
        assert_eq!(store.user_by_name("me").unwrap().id, 1);
        assert!(store.user_by_name("someone").is_none());
        assert!(store.user(2).is_none());
    }
}
