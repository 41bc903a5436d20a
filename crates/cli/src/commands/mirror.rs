use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use super::App;
use cloudtune_core::config::{default_sftp_port, SftpConfig};
use cloudtune_core::mirror::{
    FileAction, FsRemoteTarget, MirrorSync, RemoteTarget, SftpRemoteTarget,
};

/// Read before prompting for the SFTP password
const PASSWORD_ENV: &str = "CLOUDTUNE_SFTP_PASSWORD";

#[derive(Subcommand, Debug)]
pub enum MirrorCommand {
    /// Mirror a built playlist to the remote directory
    Sync {
        playlist_id: u64,

        /// Mounted remote root, instead of mirror.root
        #[arg(long, conflicts_with = "host")]
        root: Option<PathBuf>,

        #[command(flatten)]
        sftp: SftpArgs,
    },
}

/// SFTP server given on the command line, instead of mirror.sftp.
#[derive(Args, Debug, Clone, Default)]
pub struct SftpArgs {
    /// SFTP host
    #[arg(long, requires = "username")]
    pub host: Option<String>,

    /// SFTP port [default: 2022]
    #[arg(long, requires = "host")]
    pub port: Option<u16>,

    /// SFTP user
    #[arg(long, requires = "host")]
    pub username: Option<String>,
}

impl SftpArgs {
    fn config(&self) -> Option<SftpConfig> {
        let (host, username) = (self.host.as_ref()?, self.username.as_ref()?);
        Some(SftpConfig::new(
            host.clone(),
            self.port.unwrap_or_else(default_sftp_port),
            username.clone(),
        ))
    }
}

pub async fn run(app: &App, command: MirrorCommand) -> Result<()> {
    match command {
        MirrorCommand::Sync {
            playlist_id,
            root,
            sftp,
        } => sync(app, playlist_id, root, &sftp).await,
    }
}

/// Where a sync goes: flags first, then the config file.
fn select_sftp(app: &App, root: Option<&PathBuf>, args: &SftpArgs) -> Option<SftpConfig> {
    match args.config() {
        Some(config) => Some(config),
        None if root.is_some() => None,
        None => app.config.mirror.sftp.clone(),
    }
}

fn sftp_password() -> Result<Option<String>> {
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("SFTP password (empty for SSH agent): ")
            .context("Failed to read password")?,
    };
    Ok(Some(password).filter(|p| !p.is_empty()))
}

async fn open_target(
    app: &App,
    root: Option<PathBuf>,
    args: &SftpArgs,
) -> Result<(Box<dyn RemoteTarget>, String)> {
    let put_attempts = app.config.mirror.put_attempts;
    if let Some(config) = select_sftp(app, root.as_ref(), args) {
        let password = sftp_password()?;
        let target = SftpRemoteTarget::connect(&config, password, put_attempts)
            .await
            .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;
        let description = format!("sftp://{}", target.address());
        return Ok((Box::new(target), description));
    }

    let target = match root {
        Some(root) => FsRemoteTarget::new(root, put_attempts),
        None => FsRemoteTarget::from_config(&app.config.mirror),
    };
    let description = target.root().display().to_string();
    Ok((Box::new(target), description))
}

async fn sync(
    app: &App,
    playlist_id: u64,
    root: Option<PathBuf>,
    sftp: &SftpArgs,
) -> Result<()> {
    let store = app.open_store()?;
    let (mut target, description) = open_target(app, root, sftp).await?;
    info!("Mirroring playlist {} to {}", playlist_id, description);

    let report = MirrorSync::new(app.layout.clone())
        .with_cancellation(app.cancel.clone())
        .sync(&store, playlist_id, &mut *target)
        .await
        .with_context(|| format!("Failed to mirror playlist {}", playlist_id))?;

    info!(
        "{}: {} created, {} updated, {} removed, {} unchanged, {} not built",
        report.remote_dir,
        report.count(FileAction::Created),
        report.count(FileAction::Updated),
        report.count(FileAction::Removed),
        report.count(FileAction::Unchanged),
        report.count(FileAction::Skipped)
    );
    for failure in report.failures() {
        warn!(
            "{}: {}",
            failure.name,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
    if !report.is_success() {
        anyhow::bail!("{} file(s) failed to sync", report.failures().count());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudtune_core::Config;
    use tokio_util::sync::CancellationToken;

    fn app(sftp: Option<SftpConfig>) -> App {
        let mut config = Config::default();
        config.mirror.sftp = sftp;
        App::new(config, CancellationToken::new()).unwrap()
    }

    fn flags(host: &str, username: &str) -> SftpArgs {
        SftpArgs {
            host: Some(host.to_string()),
            port: None,
            username: Some(username.to_string()),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let app = app(Some(SftpConfig::new("configured", 22, "cfg")));
        let selected = select_sftp(&app, None, &flags("radio.example.org", "dj")).unwrap();
        assert_eq!(selected.host, "radio.example.org");
        assert_eq!(selected.port, 2022);
        assert_eq!(selected.username, "dj");
    }

    #[test]
    fn test_root_flag_skips_configured_sftp() {
        let app = app(Some(SftpConfig::new("configured", 22, "cfg")));
        let root = PathBuf::from("/mnt/radio");
        assert!(select_sftp(&app, Some(&root), &SftpArgs::default()).is_none());

        let selected = select_sftp(&app, None, &SftpArgs::default()).unwrap();
        assert_eq!(selected.host, "configured");
    }

    #[test]
    fn test_mounted_root_without_sftp() {
        assert!(select_sftp(&app(None), None, &SftpArgs::default()).is_none());
    }

    #[tokio::test]
    async fn test_open_mounted_target() {
        let temp = tempfile::TempDir::new().unwrap();
        let (target, description) =
            open_target(&app(None), Some(temp.path().to_path_buf()), &SftpArgs::default())
                .await
                .unwrap();
        assert_eq!(target.name(), "fs");
        assert_eq!(description, temp.path().display().to_string());
    }
}
