pub mod catalog;
pub mod config;
pub mod enrichment;
pub mod ingest;
pub mod layout;
pub mod mirror;
pub mod provider;
pub mod reconcile;
pub mod tagger;
pub mod testing;

pub use catalog::{CatalogError, CatalogStore, Playlist, SearchQuery, Track, User};
pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config, ConfigError,
    SanitizedConfig, SftpConfig,
};
pub use enrichment::{list_builds, BuildError, BuildOptions, BuildPipeline, BuildReport};
pub use ingest::{IngestError, Ingestor, PullOptions};
pub use layout::LibraryLayout;
pub use mirror::{
    FsRemoteTarget, MirrorError, MirrorSync, RemoteTarget, SftpRemoteTarget, SyncReport,
};
pub use provider::{HttpProvider, ProviderError, SourceProvider};
pub use reconcile::{diff, ActualEntry, ArtifactDiff};
pub use tagger::{LoftyTagEditor, TagEditor, TaggerError};
