//! Tag editor backed by lofty.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use tracing::debug;

use super::{TagEditor, TagState, TagUpdate, TaggerError};

/// Runs lofty on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LoftyTagEditor;

impl LoftyTagEditor {
    pub fn new() -> Self {
        Self
    }
}

fn read_file(path: &Path) -> Result<TaggedFile, TaggerError> {
    let read_err = |reason: String| TaggerError::Read {
        path: path.to_path_buf(),
        reason,
    };
    Probe::open(path)
        .map_err(|e| read_err(e.to_string()))?
        .read()
        .map_err(|e| read_err(e.to_string()))
}

fn inspect_blocking(path: &Path) -> Result<TagState, TaggerError> {
    let tagged_file = read_file(path)?;
    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Ok(TagState::default());
    };

    Ok(TagState {
        title: tag.title().map(|s| s.to_string()),
        artist: tag.artist().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        year: tag.year(),
        has_lyrics: tag
            .get_string(&ItemKey::Lyrics)
            .is_some_and(|l| !l.trim().is_empty()),
        has_artwork: !tag.pictures().is_empty(),
    })
}

fn apply_blocking(path: &Path, update: TagUpdate) -> Result<(), TaggerError> {
    let mut tagged_file = read_file(path)?;

    let picture = match update.artwork {
        Some(bytes) => {
            let mut picture = Picture::from_reader(&mut Cursor::new(bytes)).map_err(|e| {
                TaggerError::InvalidArtwork {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;
            picture.set_pic_type(PictureType::CoverFront);
            Some(picture)
        }
        None => None,
    };

    if tagged_file.primary_tag().is_none() {
        let tag_type = tagged_file.primary_tag_type();
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let Some(tag) = tagged_file.primary_tag_mut() else {
        return Err(TaggerError::Write {
            path: path.to_path_buf(),
            reason: "file format cannot hold tags".to_string(),
        });
    };

    tag.set_title(update.title);
    tag.set_artist(update.artist);
    tag.set_album(update.album);
    match update.year {
        Some(year) => tag.set_year(year),
        None => tag.remove_year(),
    }
    if let Some(lyrics) = update.lyrics {
        tag.insert_text(ItemKey::Lyrics, lyrics);
    }
    if let Some(picture) = picture {
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(picture);
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|e| TaggerError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    debug!("Wrote tags to {}", path.display());
    Ok(())
}

#[async_trait]
impl TagEditor for LoftyTagEditor {
    fn name(&self) -> &str {
        "lofty"
    }

    async fn inspect(&self, path: &Path) -> Result<TagState, TaggerError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || inspect_blocking(&path)).await?
    }

    async fn apply(&self, path: &Path, update: TagUpdate) -> Result<(), TaggerError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || apply_blocking(&path, update)).await?
    }
}
