//! Read-only catalog queries.

use std::collections::HashSet;

use super::{CatalogError, CatalogStore, Playlist, Track, User};

/// Selects entities by identifier or by name.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub id: Option<u64>,
    pub name: Option<String>,
    /// Case-insensitive substring match instead of exact match.
    pub fuzzy: bool,
}

impl SearchQuery {
    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.id.is_none() && self.name.is_none() {
            return Err(CatalogError::InvalidQuery(
                "id or name must be specified".to_string(),
            ));
        }
        Ok(())
    }

    fn matches_text(&self, needle: &str, candidate: &str) -> bool {
        if self.fuzzy {
            candidate.to_lowercase().contains(&needle.to_lowercase())
        } else {
            needle == candidate
        }
    }
}

/// A track found by [`CatalogStore::find_tracks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMatch {
    pub id: u64,
    pub std_name: String,
}

/// A playlist found by [`CatalogStore::find_playlists`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistMatch {
    pub id: u64,
    pub name: String,
}

/// A track that is a member of a playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistMembership {
    pub playlist_id: u64,
    pub playlist_name: String,
    pub track_id: u64,
    /// Standard name, when the track is in the catalog.
    pub track_name: Option<String>,
}

/// Tracks of a playlist resolved against the catalog.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTracks {
    /// Resolved tracks, de-duplicated, in playlist order.
    pub tracks: Vec<Track>,
    /// Ids referenced by the playlist but absent from the catalog.
    pub missing: Vec<u64>,
}

/// Removes repeated ids, keeping the first occurrence.
pub fn dedup_ids(ids: &[u64]) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl CatalogStore {
    /// Finds tracks by id, or by name (track name or standard name).
    ///
    /// An id match ends the search.
    pub fn find_tracks(&self, query: &SearchQuery) -> Result<Vec<TrackMatch>, CatalogError> {
        query.validate()?;

        let mut matches = Vec::new();
        for track in self.tracks() {
            let std_name = track.std_name(false);
            if query.id == Some(track.id) {
                matches.push(TrackMatch {
                    id: track.id,
                    std_name,
                });
                break;
            }
            if let Some(name) = &query.name {
                let hit = if query.fuzzy {
                    query.matches_text(name, &std_name)
                } else {
                    *name == track.name || *name == std_name
                };
                if hit {
                    matches.push(TrackMatch {
                        id: track.id,
                        std_name,
                    });
                }
            }
        }
        Ok(matches)
    }

    /// Finds playlists by id or name.
    pub fn find_playlists(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<PlaylistMatch>, CatalogError> {
        query.validate()?;

        let mut matches = Vec::new();
        for playlist in self.playlists() {
            if query.id == Some(playlist.id) {
                matches.push(PlaylistMatch {
                    id: playlist.id,
                    name: playlist.name.clone(),
                });
                break;
            }
            if let Some(name) = &query.name {
                if query.matches_text(name, &playlist.name) {
                    matches.push(PlaylistMatch {
                        id: playlist.id,
                        name: playlist.name.clone(),
                    });
                }
            }
        }
        Ok(matches)
    }

    /// Lists the playlists containing the selected tracks.
    ///
    /// With a name, the tracks are selected through [`Self::find_tracks`];
    /// with only an id, the id is used as-is even if the track itself is not
    /// in the catalog.
    pub fn find_track_in_playlists(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<PlaylistMembership>, CatalogError> {
        query.validate()?;

        let wanted: HashSet<u64> = match (&query.name, query.id) {
            (None, Some(id)) => HashSet::from([id]),
            _ => {
                let by_name = SearchQuery {
                    id: None,
                    name: query.name.clone(),
                    fuzzy: query.fuzzy,
                };
                self.find_tracks(&by_name)?
                    .into_iter()
                    .map(|m| m.id)
                    .collect()
            }
        };

        let mut memberships = Vec::new();
        for playlist in self.playlists() {
            let mut ids: Vec<u64> = dedup_ids(&playlist.music_ids)
                .into_iter()
                .filter(|id| wanted.contains(id))
                .collect();
            ids.sort_unstable();
            for track_id in ids {
                memberships.push(PlaylistMembership {
                    playlist_id: playlist.id,
                    playlist_name: playlist.name.clone(),
                    track_id,
                    track_name: self.track(track_id).map(|t| t.std_name(false)),
                });
            }
        }
        Ok(memberships)
    }

    /// Catalog playlists listed by the user, in the user's order.
    pub fn playlists_for_user(&self, user: &User) -> Vec<&Playlist> {
        dedup_ids(&user.playlists)
            .into_iter()
            .filter_map(|id| self.playlist(id))
            .collect()
    }

    /// Resolves a playlist's ids to catalog tracks.
    pub fn resolve_playlist_tracks(&self, playlist: &Playlist) -> ResolvedTracks {
        let mut resolved = ResolvedTracks::default();
        for id in dedup_ids(&playlist.music_ids) {
            match self.track(id) {
                Some(track) => resolved.tracks.push(track.clone()),
                None => resolved.missing.push(id),
            }
        }
        resolved
    }
}
