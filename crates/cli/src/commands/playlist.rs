use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Subcommand};
use tracing::{info, warn};

use super::{usage_error, App, Selector};
use cloudtune_core::ingest::{PullOptions, PullReport};
use cloudtune_core::{Playlist, SearchQuery};

#[derive(Subcommand, Debug)]
pub enum PlaylistCommand {
    /// List playlists, optionally only those of one user
    List {
        #[command(flatten)]
        owner: Owner,
    },

    /// Pull playlists and their tracks from the provider
    Pull {
        #[command(flatten)]
        target: PullTarget,

        /// Download raw audio for every track
        #[arg(long)]
        download: bool,

        /// Refetch details of tracks already in the catalog
        #[arg(long)]
        update_details: bool,
    },

    /// Find playlists in the catalog
    Search {
        #[command(flatten)]
        selector: Selector,
    },
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("owner").args(["user_id", "user_name"])))]
pub struct Owner {
    #[arg(long)]
    pub user_id: Option<u64>,

    #[arg(long)]
    pub user_name: Option<String>,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("pull_target").required(true).args(["all", "id", "name"])))]
pub struct PullTarget {
    /// Every playlist of the logged-in account
    #[arg(long)]
    pub all: bool,

    #[arg(long)]
    pub id: Option<u64>,

    /// Name of a playlist already in the catalog
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub fuzzy: bool,
}

pub async fn run(app: &App, command: PlaylistCommand) -> Result<()> {
    match command {
        PlaylistCommand::List { owner } => list(app, &owner),
        PlaylistCommand::Pull {
            target,
            download,
            update_details,
        } => {
            let options = PullOptions {
                download,
                update_details,
            };
            pull(app, &target, &options).await
        }
        PlaylistCommand::Search { selector } => search(app, &selector),
    }
}

fn print_playlist(playlist: &Playlist) {
    println!(
        "{}: {} ({} tracks)",
        playlist.id,
        playlist.name,
        playlist.music_ids.len()
    );
}

fn list(app: &App, owner: &Owner) -> Result<()> {
    let store = app.open_store()?;
    let user = match (owner.user_id, &owner.user_name) {
        (Some(id), _) => Some(
            store
                .user(id)
                .unwrap_or_else(|| usage_error(format!("unknown user id {}", id))),
        ),
        (None, Some(name)) => Some(
            store
                .user_by_name(name)
                .unwrap_or_else(|| usage_error(format!("unknown user name {:?}", name))),
        ),
        (None, None) => None,
    };

    match user {
        Some(user) => store
            .playlists_for_user(user)
            .into_iter()
            .for_each(print_playlist),
        None => store.playlists().for_each(print_playlist),
    }
    Ok(())
}

fn summarize(report: &PullReport) {
    info!(
        "{} - {}: {} tracks, {} downloaded, {} up to date, {} unavailable, {} failed",
        report.playlist_id,
        report.name,
        report.tracks,
        report.downloaded,
        report.up_to_date,
        report.unavailable.len(),
        report.failure_count()
    );
}

async fn pull(app: &App, target: &PullTarget, options: &PullOptions) -> Result<()> {
    let mut store = app.open_store()?;
    let ingestor = app.ingestor();

    if target.all {
        let report = ingestor
            .pull_account(&mut store, options)
            .await
            .context("Failed to pull account")?;
        report.playlists.iter().for_each(summarize);
        if !report.failed_playlists.is_empty() {
            anyhow::bail!(
                "{} playlist(s) could not be pulled: {:?}",
                report.failed_playlists.len(),
                report.failed_playlists
            );
        }
        return Ok(());
    }

    let ids: Vec<u64> = match (target.id, &target.name) {
        (Some(id), _) => vec![id],
        (None, Some(name)) => store
            .find_playlists(&SearchQuery::by_name(name.clone()).fuzzy(target.fuzzy))?
            .into_iter()
            .map(|m| m.id)
            .collect(),
        (None, None) => Vec::new(),
    };
    if ids.is_empty() {
        warn!("No matching playlist");
        return Ok(());
    }

    let mut failures = 0;
    for id in ids {
        let result = ingestor.pull_playlist(&mut store, id, options).await;
        store.save()?;
        let report = result.with_context(|| format!("Failed to pull playlist {}", id))?;
        summarize(&report);
        failures += report.failure_count();
    }
    if failures > 0 {
        anyhow::bail!("{} track(s) failed", failures);
    }
    Ok(())
}

fn search(app: &App, selector: &Selector) -> Result<()> {
    let store = app.open_store()?;
    let matches = store.find_playlists(&selector.query())?;
    if matches.is_empty() {
        warn!("No matching playlist");
    }
    for m in matches {
        println!("{}: {}", m.id, m.name);
    }
    Ok(())
}
