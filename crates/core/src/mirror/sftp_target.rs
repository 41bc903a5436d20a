//! Remote target on an SFTP server.
//!
//! libssh2 calls block, so every operation runs on the blocking pool while
//! holding the session lock.

use async_trait::async_trait;
use ssh2::{ErrorCode, FileStat, HashType, RenameFlags, Session, Sftp};
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::TransferError;
use super::traits::{validate_name, RemoteTarget};
use super::types::RemoteEntry;
use crate::config::SftpConfig;

/// LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;
const DIR_MODE: i32 = 0o755;

/// SFTP based remote target.
pub struct SftpRemoteTarget {
    /// Kept alive for the lifetime of the SFTP channel.
    _session: Session,
    sftp: Arc<Mutex<Sftp>>,
    address: String,
    root: String,
    /// Working directory, relative to `root`.
    context: String,
    put_attempts: u32,
}

impl SftpRemoteTarget {
    /// Opens an SSH session and its SFTP channel.
    ///
    /// Authenticates with `password` when given, with the SSH agent
    /// otherwise.
    pub async fn connect(
        config: &SftpConfig,
        password: Option<String>,
        put_attempts: u32,
    ) -> Result<Self, TransferError> {
        let address = format!("{}@{}:{}", config.username, config.host, config.port);
        info!("Connecting to sftp://{}", address);

        let root = config.root.clone();
        let config = config.clone();
        let (session, sftp) =
            tokio::task::spawn_blocking(move || open_session(&config, password.as_deref()))
                .await
                .map_err(join_error)??;

        Ok(Self {
            _session: session,
            sftp: Arc::new(Mutex::new(sftp)),
            address,
            root,
            context: String::new(),
            put_attempts: put_attempts.max(1),
        })
    }

    /// `user@host:port` of the server.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Runs `op` against the SFTP channel on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T, TransferError>
    where
        T: Send + 'static,
        F: FnOnce(&Sftp) -> Result<T, TransferError> + Send + 'static,
    {
        let sftp = self.sftp.clone();
        tokio::task::spawn_blocking(move || {
            let sftp = sftp.blocking_lock();
            op(&sftp)
        })
        .await
        .map_err(join_error)?
    }

    fn resolve_dir(&self, path: &str) -> Result<PathBuf, TransferError> {
        if !path.is_empty() {
            validate_name(path)?;
        }
        Ok(remote_path(&self.root, &[path]))
    }

    fn resolve_file(&self, name: &str) -> Result<PathBuf, TransferError> {
        validate_name(name)?;
        Ok(remote_path(&self.root, &[&self.context, name]))
    }
}

fn open_session(
    config: &SftpConfig,
    password: Option<&str>,
) -> Result<(Session, Sftp), TransferError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let tcp = connect_tcp(&config.host, config.port, timeout)?;

    let mut session = Session::new()?;
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session.set_tcp_stream(tcp);
    session.handshake()?;
    if let Some(hash) = session.host_key_hash(HashType::Sha256) {
        debug!("Host key SHA256 fingerprint: {}", hex(hash));
    }

    match password {
        Some(password) => session.userauth_password(&config.username, password)?,
        None => session.userauth_agent(&config.username)?,
    }
    if !session.authenticated() {
        return Err(TransferError::Authentication(config.username.clone()));
    }

    let sftp = session.sftp()?;
    Ok((session, sftp))
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TransferError> {
    let mut last_error = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connecting to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }
    Err(TransferError::Io(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} did not resolve", host),
        )
    })))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Joins non-empty components under `root`. An empty result is the login
/// directory.
fn remote_path(root: &str, parts: &[&str]) -> PathBuf {
    let mut path = PathBuf::from(root);
    for part in parts.iter().filter(|p| !p.is_empty()) {
        path.push(part);
    }
    if path.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        path
    }
}

fn temp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.part", name))
}

fn not_found_or_ssh(e: ssh2::Error, what: &str) -> TransferError {
    if matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) {
        TransferError::NotFound(what.to_string())
    } else {
        TransferError::Ssh(e)
    }
}

fn join_error(e: tokio::task::JoinError) -> TransferError {
    TransferError::Io(std::io::Error::other(e))
}

fn entry_from_stat(name: String, stat: &FileStat) -> RemoteEntry {
    if stat.is_dir() {
        RemoteEntry::dir(name)
    } else {
        RemoteEntry::file(name, stat.size.unwrap_or(0))
    }
}

/// Uploads to a temporary name, then renames over the destination.
fn put_once(sftp: &Sftp, local: &Path, dest: &Path) -> Result<u64, TransferError> {
    let temp = temp_path(dest);
    let result = (|| -> Result<u64, TransferError> {
        let mut source = std::fs::File::open(local)?;
        let mut remote = sftp.create(&temp)?;
        let size = std::io::copy(&mut source, &mut remote)?;
        remote.flush()?;
        drop(remote);
        replace(sftp, &temp, dest)?;
        Ok(size)
    })();
    if result.is_err() {
        let _ = sftp.unlink(&temp);
    }
    result
}

/// SFTPv3 servers may refuse to rename over an existing file.
fn replace(sftp: &Sftp, from: &Path, to: &Path) -> Result<(), TransferError> {
    let flags = RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE;
    if let Err(e) = sftp.rename(from, to, Some(flags)) {
        debug!("Overwriting rename refused ({}), unlinking first", e);
        let _ = sftp.unlink(to);
        sftp.rename(from, to, None)?;
    }
    Ok(())
}

#[async_trait]
impl RemoteTarget for SftpRemoteTarget {
    fn name(&self) -> &str {
        "sftp"
    }

    async fn list_entries(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransferError> {
        let dir = self.resolve_dir(path)?;
        let what = path.to_string();
        let mut entries = self
            .blocking(move |sftp| {
                let listed = sftp.readdir(&dir).map_err(|e| not_found_or_ssh(e, &what))?;
                Ok(listed
                    .into_iter()
                    .filter_map(|(path, stat)| {
                        let name = path.file_name()?.to_string_lossy().to_string();
                        Some(entry_from_stat(name, &stat))
                    })
                    .filter(|e| e.name != "." && e.name != "..")
                    .collect::<Vec<_>>())
            })
            .await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn make_directory(&mut self, path: &str) -> Result<(), TransferError> {
        validate_name(path)?;
        let dir = remote_path(&self.root, &[path]);
        self.blocking(move |sftp| Ok(sftp.mkdir(&dir, DIR_MODE)?))
            .await?;
        debug!("Created remote directory {}", path);
        Ok(())
    }

    async fn change_context(&mut self, path: &str) -> Result<(), TransferError> {
        let dir = self.resolve_dir(path)?;
        let what = path.to_string();
        let is_dir = self
            .blocking(move |sftp| {
                let stat = sftp.stat(&dir).map_err(|e| not_found_or_ssh(e, &what))?;
                Ok(stat.is_dir())
            })
            .await?;
        if !is_dir {
            return Err(TransferError::NotFound(path.to_string()));
        }
        self.context = path.to_string();
        Ok(())
    }

    async fn put(&mut self, local: &Path, remote_name: &str) -> Result<u64, TransferError> {
        let dest = self.resolve_file(remote_name)?;
        if !local.is_file() {
            return Err(TransferError::NotFound(local.display().to_string()));
        }

        let mut attempt = 1;
        loop {
            let (local, dest) = (local.to_path_buf(), dest.clone());
            match self
                .blocking(move |sftp| put_once(sftp, &local, &dest))
                .await
            {
                Ok(size) => return Ok(size),
                Err(e) if attempt < self.put_attempts => {
                    warn!(
                        "Upload of {} failed (attempt {}/{}): {}, retrying",
                        remote_name, attempt, self.put_attempts, e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn remove(&mut self, remote_name: &str) -> Result<(), TransferError> {
        let path = self.resolve_file(remote_name)?;
        let what = remote_name.to_string();
        self.blocking(move |sftp| sftp.unlink(&path).map_err(|e| not_found_or_ssh(e, &what)))
            .await
    }

    async fn stat(&mut self, remote_name: &str) -> Result<RemoteEntry, TransferError> {
        let path = self.resolve_file(remote_name)?;
        let name = remote_name.to_string();
        self.blocking(move |sftp| {
            let stat = sftp.stat(&path).map_err(|e| not_found_or_ssh(e, &name))?;
            Ok(entry_from_stat(name, &stat))
        })
        .await
    }
}
