use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::{info, warn};

use super::{App, Selector};
use cloudtune_core::ingest::DownloadOutcome;

#[derive(Subcommand, Debug)]
pub enum TrackCommand {
    /// List every track in the catalog
    List,

    /// Find tracks in the catalog
    Search {
        #[command(flatten)]
        selector: Selector,

        /// Download the raw audio of every match
        #[arg(long)]
        download: bool,
    },

    /// List the playlists containing the matching tracks
    SearchInPlaylists {
        #[command(flatten)]
        selector: Selector,
    },
}

pub async fn run(app: &App, command: TrackCommand) -> Result<()> {
    match command {
        TrackCommand::List => list(app),
        TrackCommand::Search { selector, download } => search(app, &selector, download).await,
        TrackCommand::SearchInPlaylists { selector } => search_in_playlists(app, &selector),
    }
}

fn list(app: &App) -> Result<()> {
    let store = app.open_store()?;
    for track in store.tracks() {
        println!("{}: {}", track.id, track.std_name(false));
    }
    Ok(())
}

async fn search(app: &App, selector: &Selector, download: bool) -> Result<()> {
    let mut store = app.open_store()?;
    let ingestor = app.ingestor();
    let mut ids: Vec<u64> = store
        .find_tracks(&selector.query())?
        .into_iter()
        .map(|m| m.id)
        .collect();

    // An id that is not in the catalog yet is looked up at the provider
    if ids.is_empty() {
        if let Some(id) = selector.id {
            ingestor
                .fetch_track(&mut store, id, false)
                .await
                .with_context(|| format!("Track {} not found", id))?;
            store.save()?;
            ids.push(id);
        }
    }

    if ids.is_empty() {
        warn!("No matching track");
        return Ok(());
    }
    for id in &ids {
        if let Some(track) = store.track(*id) {
            println!("{}: {}", track.id, track.std_name(false));
        }
    }

    if download {
        let mut failed = 0;
        for id in ids {
            if app.cancel.is_cancelled() {
                anyhow::bail!("Cancelled");
            }
            match ingestor.download_track(id).await {
                Ok(DownloadOutcome::Downloaded { bytes }) => {
                    info!("Downloaded {} ({} bytes)", id, bytes)
                }
                Ok(DownloadOutcome::AlreadyUpToDate) => info!("{} is up to date", id),
                Ok(DownloadOutcome::Unavailable) => failed += 1,
                Ok(DownloadOutcome::Failed { .. }) => failed += 1,
                Err(e) => {
                    warn!("Failed to download {}: {}", id, e);
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            anyhow::bail!("{} track(s) could not be downloaded", failed);
        }
    }
    Ok(())
}

fn search_in_playlists(app: &App, selector: &Selector) -> Result<()> {
    let store = app.open_store()?;
    let memberships = store.find_track_in_playlists(&selector.query())?;
    if memberships.is_empty() {
        warn!("No playlist contains a matching track");
    }
    for m in memberships {
        println!(
            "{} {}: {} {}",
            m.playlist_id,
            m.playlist_name,
            m.track_id,
            m.track_name.as_deref().unwrap_or("?")
        );
    }
    Ok(())
}
