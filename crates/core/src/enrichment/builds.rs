//! Built destinations under `dist/`.

use tokio::fs;

use super::BuiltDestination;
use crate::catalog::{CatalogStore, User};
use crate::layout::LibraryLayout;

/// Destination name of an ad-hoc track build.
///
/// Uses `dirname` when given, else the id or name the tracks were searched
/// by, else `_`.
pub fn adhoc_destination(dirname: Option<&str>, id: Option<u64>, name: Option<&str>) -> String {
    let raw = match (dirname, id, name) {
        (Some(dir), _, _) if !dir.is_empty() => dir.to_string(),
        (_, Some(id), _) => id.to_string(),
        (_, _, Some(name)) if !name.is_empty() => name.to_string(),
        _ => return "_".to_string(),
    };

    let cleaned: String = raw
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Lists destination directories with the playlist each was built from.
///
/// Sorted by name, or by position in `sort_by_user`'s playlist list when
/// given. Destinations that are not one of the user's playlists come first.
pub async fn list_builds(
    layout: &LibraryLayout,
    store: &CatalogStore,
    sort_by_user: Option<&User>,
) -> std::io::Result<Vec<BuiltDestination>> {
    let mut builds = Vec::new();
    let mut reader = match fs::read_dir(layout.dist_dir()).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(builds),
        Err(e) => return Err(e),
    };

    while let Some(entry) = reader.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let playlist_name = name
            .parse::<u64>()
            .ok()
            .and_then(|id| store.playlist(id))
            .map(|p| p.name.clone());
        let files = count_files(&entry.path()).await?;
        builds.push(BuiltDestination {
            name,
            playlist_name,
            files,
        });
    }

    builds.sort_by(|a, b| a.name.cmp(&b.name));
    if let Some(user) = sort_by_user {
        builds.sort_by_key(|b| {
            b.name
                .parse::<u64>()
                .ok()
                .and_then(|id| user.playlists.iter().position(|p| *p == id))
                .map_or(-1, |pos| pos as i64)
        });
    }
    Ok(builds)
}

async fn count_files(dir: &std::path::Path) -> std::io::Result<usize> {
    let mut count = 0;
    let mut reader = fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        if entry.file_type().await?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_adhoc_destination() {
        assert_eq!(adhoc_destination(Some("mix"), Some(1), None), "mix");
        assert_eq!(adhoc_destination(None, Some(42), Some("x")), "42");
        assert_eq!(adhoc_destination(None, None, Some("AC/DC")), "AC_DC");
        assert_eq!(adhoc_destination(None, None, None), "_");
        assert_eq!(adhoc_destination(Some(".."), None, None), "_");
    }

    #[tokio::test]
    async fn test_list_builds_missing_dist() {
        let temp = TempDir::new().unwrap();
        let layout = LibraryLayout::new(temp.path());
        let store = CatalogStore::new(layout.catalog_dir());
        assert!(list_builds(&layout, &store, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_builds_sorted_by_user() {
        let temp = TempDir::new().unwrap();
        let layout = LibraryLayout::new(temp.path());
        for dest in ["7001", "7002", "mix"] {
            std::fs::create_dir_all(layout.destination_dir(dest)).unwrap();
        }
        std::fs::write(layout.dist_path("7002", 1), "a").unwrap();
        std::fs::write(layout.dist_path("7002", 2), "b").unwrap();

        let mut store = CatalogStore::new(layout.catalog_dir());
        store.upsert_playlist(fixtures::playlist(7001, "First", &[]));
        store.upsert_playlist(fixtures::playlist(7002, "Second", &[1, 2]));

        let builds = list_builds(&layout, &store, None).await.unwrap();
        let names: Vec<_> = builds.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["7001", "7002", "mix"]);
        assert_eq!(builds[1].display_name(), "Second");
        assert_eq!(builds[1].files, 2);
        assert_eq!(builds[2].display_name(), "?");

        let user = fixtures::user(1, "me", &[7002, 7001]);
        let builds = list_builds(&layout, &store, Some(&user)).await.unwrap();
        let names: Vec<_> = builds.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["mix", "7002", "7001"]);
    }
}
