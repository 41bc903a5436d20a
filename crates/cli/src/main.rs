mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloudtune_core::{load_config, load_default_config, validate_config, Config};

use commands::build::BuildCommand;
use commands::config::ConfigCommand;
use commands::mirror::MirrorCommand;
use commands::playlist::PlaylistCommand;
use commands::track::TrackCommand;
use commands::user::UserCommand;
use commands::App;

/// Config file used when neither --config nor CLOUDTUNE_CONFIG is set
const DEFAULT_CONFIG_PATH: &str = "cloudtune.toml";

#[derive(Parser, Debug)]
#[command(name = "cloudtune", version, about = "Snapshot a music account into a local library")]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "CLOUDTUNE_CONFIG")]
    config: Option<PathBuf>,

    /// Delay between provider API calls, in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    api_delay: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Catalog tracks
    #[command(subcommand)]
    Track(TrackCommand),

    /// Catalog playlists
    #[command(subcommand)]
    Playlist(PlaylistCommand),

    /// Tagged builds under dist/
    #[command(subcommand)]
    Build(BuildCommand),

    /// Catalog users
    #[command(subcommand)]
    User(UserCommand),

    /// Remote mirrors of built playlists
    #[command(subcommand)]
    Mirror(MirrorCommand),

    /// Effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = resolve_config(cli.config.as_ref())?;
    if let Some(delay) = cli.api_delay {
        config.provider.api_delay_ms = delay;
    }
    validate_config(&config).context("Configuration validation failed")?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current item");
            signal_token.cancel();
        }
    });

    let app = App::new(config, cancel)?;
    match cli.command {
        Command::Track(command) => commands::track::run(&app, command).await,
        Command::Playlist(command) => commands::playlist::run(&app, command).await,
        Command::Build(command) => commands::build::run(&app, command).await,
        Command::User(command) => commands::user::run(&app, command).await,
        Command::Mirror(command) => commands::mirror::run(&app, command).await,
        Command::Config(command) => commands::config::run(&app, command).await,
    }
}

/// Loads the given config file, or the default one when it exists, or the
/// built-in defaults.
fn resolve_config(path: Option<&PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path.clone(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if !default.exists() {
                info!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                return load_default_config().context("Failed to load default configuration");
            }
            default
        }
    };

    info!("Loading configuration from {:?}", path);
    load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_build_playlist_by_id() {
        let cli = Cli::try_parse_from([
            "cloudtune",
            "build",
            "playlist",
            "--id",
            "7001",
            "--pull-lyrics",
        ])
        .unwrap();
        match cli.command {
            Command::Build(BuildCommand::Playlist { selector, enrich }) => {
                assert_eq!(selector.id, Some(7001));
                assert!(enrich.pull_lyrics);
                assert!(!enrich.update_artwork);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_selector_is_required() {
        let err = Cli::try_parse_from(["cloudtune", "track", "search"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_id_and_name_conflict() {
        let err = Cli::try_parse_from([
            "cloudtune", "playlist", "search", "--id", "1", "--name", "x",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_pull_all_with_global_flags() {
        let cli = Cli::try_parse_from([
            "cloudtune",
            "playlist",
            "pull",
            "--all",
            "--download",
            "--api-delay",
            "250",
        ])
        .unwrap();
        assert_eq!(cli.api_delay, Some(250));
        match cli.command {
            Command::Playlist(PlaylistCommand::Pull {
                target, download, ..
            }) => {
                assert!(target.all);
                assert!(download);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_mirror_sync_positional_id() {
        let cli =
            Cli::try_parse_from(["cloudtune", "mirror", "sync", "7001", "--root", "/tmp/m"])
                .unwrap();
        match cli.command {
            Command::Mirror(MirrorCommand::Sync {
                playlist_id,
                root,
                sftp,
            }) => {
                assert_eq!(playlist_id, 7001);
                assert_eq!(root, Some(PathBuf::from("/tmp/m")));
                assert!(sftp.host.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_mirror_sync_over_sftp() {
        let cli = Cli::try_parse_from([
            "cloudtune",
            "mirror",
            "sync",
            "7001",
            "--host",
            "radio.example.org",
            "--port",
            "2222",
            "--username",
            "dj",
        ])
        .unwrap();
        match cli.command {
            Command::Mirror(MirrorCommand::Sync { sftp, root, .. }) => {
                assert!(root.is_none());
                assert_eq!(sftp.host.as_deref(), Some("radio.example.org"));
                assert_eq!(sftp.port, Some(2222));
                assert_eq!(sftp.username.as_deref(), Some("dj"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_mirror_sync_sftp_flag_rules() {
        let err = Cli::try_parse_from([
            "cloudtune", "mirror", "sync", "1", "--host", "h",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from([
            "cloudtune", "mirror", "sync", "1", "--host", "h", "--username", "u", "--root", "/m",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
