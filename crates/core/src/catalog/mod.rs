//! Local catalog - tracks, playlists and users pulled from the provider.
//!
//! The catalog is held in memory and persisted as three JSON files keyed by
//! stringified identifier. Callers own the store exclusively and decide when a
//! snapshot is written.

mod query;
mod store;
mod types;

pub use query::{
    dedup_ids, PlaylistMatch, PlaylistMembership, ResolvedTracks, SearchQuery, TrackMatch,
};
pub use store::CatalogStore;
pub use types::*;
