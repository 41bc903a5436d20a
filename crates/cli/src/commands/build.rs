use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::{info, warn};

use super::{usage_error, App, EnrichArgs, Selector};
use cloudtune_core::enrichment::{adhoc_destination, list_builds, BuildOptions, BuildReport};
use cloudtune_core::Track;

#[derive(Subcommand, Debug)]
pub enum BuildCommand {
    /// List built destinations
    List {
        /// Order by this user's playlist order
        #[arg(long, value_name = "USER_ID")]
        sort_by: Option<u64>,
    },

    /// Build playlists into dist/<playlist id>/
    Playlist {
        #[command(flatten)]
        selector: Selector,

        #[command(flatten)]
        enrich: EnrichArgs,
    },

    /// Build matching tracks into one directory
    Track {
        #[command(flatten)]
        selector: Selector,

        /// Destination directory name under dist/
        #[arg(long)]
        dirname: Option<String>,

        #[command(flatten)]
        enrich: EnrichArgs,
    },
}

pub async fn run(app: &App, command: BuildCommand) -> Result<()> {
    match command {
        BuildCommand::List { sort_by } => list(app, sort_by).await,
        BuildCommand::Playlist { selector, enrich } => {
            build_playlists(app, &selector, &enrich.into()).await
        }
        BuildCommand::Track {
            selector,
            dirname,
            enrich,
        } => build_tracks(app, &selector, dirname.as_deref(), &enrich.into()).await,
    }
}

async fn list(app: &App, sort_by: Option<u64>) -> Result<()> {
    let store = app.open_store()?;
    let user = sort_by.map(|id| {
        store
            .user(id)
            .unwrap_or_else(|| usage_error(format!("unknown user id {}", id)))
    });

    let builds = list_builds(&app.layout, &store, user)
        .await
        .context("Failed to list builds")?;
    for build in builds {
        println!(
            "{}: {} ({} files)",
            build.name,
            build.display_name(),
            build.files
        );
    }
    Ok(())
}

fn summarize(report: &BuildReport) {
    info!(
        "{}: {} built, {} not downloaded, {} removed",
        report.destination,
        report.built.len(),
        report.skipped.len(),
        report.removed.len()
    );
}

async fn build_playlists(app: &App, selector: &Selector, options: &BuildOptions) -> Result<()> {
    let store = app.open_store()?;
    let matches = store.find_playlists(&selector.query())?;
    if matches.is_empty() {
        warn!("No matching playlist");
        return Ok(());
    }

    let pipeline = app.build_pipeline();
    for m in matches {
        info!("Building playlist: {} - {}", m.id, m.name);
        let report = pipeline
            .build_playlist(&store, m.id, options)
            .await
            .with_context(|| format!("Failed to build playlist {}", m.id))?;
        summarize(&report);
    }
    Ok(())
}

async fn build_tracks(
    app: &App,
    selector: &Selector,
    dirname: Option<&str>,
    options: &BuildOptions,
) -> Result<()> {
    let store = app.open_store()?;
    let tracks: Vec<Track> = store
        .find_tracks(&selector.query())?
        .into_iter()
        .filter_map(|m| store.track(m.id).cloned())
        .collect();
    if tracks.is_empty() {
        warn!("No matching track");
        return Ok(());
    }

    let destination = adhoc_destination(dirname, selector.id, selector.name.as_deref());
    let report = app
        .build_pipeline()
        .build(&tracks, &destination, options)
        .await
        .with_context(|| format!("Failed to build {}", destination))?;
    summarize(&report);
    Ok(())
}
