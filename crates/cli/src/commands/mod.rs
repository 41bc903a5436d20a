//! Subcommand handlers.

pub mod build;
pub mod config;
pub mod mirror;
pub mod playlist;
pub mod track;
pub mod user;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgGroup, Args, CommandFactory};
use tokio_util::sync::CancellationToken;

use cloudtune_core::enrichment::{BuildOptions, BuildPipeline};
use cloudtune_core::{
    CatalogStore, Config, HttpProvider, Ingestor, LibraryLayout, LoftyTagEditor, SearchQuery,
    SourceProvider,
};

/// Everything a command needs, built from the loaded configuration.
///
/// Holds one provider so every command shares its client and throttle.
pub struct App {
    pub config: Config,
    pub layout: LibraryLayout,
    pub cancel: CancellationToken,
    provider: Arc<dyn SourceProvider>,
}

impl App {
    pub fn new(config: Config, cancel: CancellationToken) -> Result<Self> {
        let provider =
            HttpProvider::new(&config.provider).context("Failed to create provider client")?;
        let layout = LibraryLayout::new(config.library.base_dir.clone());
        Ok(Self {
            config,
            layout,
            cancel,
            provider: Arc::new(provider),
        })
    }

    pub fn open_store(&self) -> Result<CatalogStore> {
        CatalogStore::open(self.layout.catalog_dir()).with_context(|| {
            format!(
                "Failed to load catalog from {}",
                self.layout.catalog_dir().display()
            )
        })
    }

    pub fn provider(&self) -> Arc<dyn SourceProvider> {
        self.provider.clone()
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.provider(), self.layout.clone(), &self.config.download)
            .with_cancellation(self.cancel.clone())
    }

    pub fn build_pipeline(&self) -> BuildPipeline {
        BuildPipeline::new(
            self.layout.clone(),
            self.provider(),
            Arc::new(LoftyTagEditor::new()),
        )
        .with_cancellation(self.cancel.clone())
    }
}

/// Selects tracks or playlists by id or by name.
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("selector").required(true).args(["id", "name"])))]
pub struct Selector {
    /// Identifier
    #[arg(long)]
    pub id: Option<u64>,

    /// Name
    #[arg(long)]
    pub name: Option<String>,

    /// Match names by case-insensitive substring
    #[arg(long)]
    pub fuzzy: bool,
}

impl Selector {
    pub fn query(&self) -> SearchQuery {
        match (&self.name, self.id) {
            (Some(name), _) => SearchQuery::by_name(name.clone()).fuzzy(self.fuzzy),
            (None, Some(id)) => SearchQuery::by_id(id),
            (None, None) => SearchQuery::default(),
        }
    }
}

/// Lyrics and artwork flags shared by the build commands.
#[derive(Args, Debug, Clone, Copy)]
pub struct EnrichArgs {
    /// Fetch lyrics for files without them
    #[arg(long)]
    pub pull_lyrics: bool,

    /// With --pull-lyrics, refetch lyrics for every file
    #[arg(long)]
    pub update_lyrics: bool,

    /// Refetch cover art for every file
    #[arg(long)]
    pub update_artwork: bool,
}

impl From<EnrichArgs> for BuildOptions {
    fn from(args: EnrichArgs) -> Self {
        Self {
            pull_lyrics: args.pull_lyrics,
            force_lyrics_refresh: args.update_lyrics,
            force_artwork_refresh: args.update_artwork,
        }
    }
}

/// Reports a bad argument the way clap does and exits with status 2.
pub fn usage_error(message: impl std::fmt::Display) -> ! {
    crate::Cli::command()
        .error(ErrorKind::InvalidValue, message)
        .exit()
}
