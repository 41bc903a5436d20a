use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
}

/// Local library configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Root of the library: raw downloads, caches, builds and catalog files.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("neteasecloudmusic")
}

/// Remote provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider API server URL (e.g., "http://localhost:3000")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Session cookie value (MUSIC_U)
    #[serde(default)]
    pub cookie: String,
    /// Minimum delay between two provider calls in milliseconds (default: 100)
    #[serde(default = "default_api_delay")]
    pub api_delay_ms: u64,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Requested audio quality level (default: "exhigh")
    #[serde(default = "default_audio_level")]
    pub audio_level: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie: String::new(),
            api_delay_ms: default_api_delay(),
            timeout_secs: default_timeout(),
            audio_level: default_audio_level(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_api_delay() -> u64 {
    100
}

fn default_timeout() -> u64 {
    30
}

fn default_audio_level() -> String {
    "exhigh".to_string()
}

/// Raw download configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Attempts per track before it is marked failed (default: 3)
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

/// Mirror target configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MirrorConfig {
    /// Root directory of the mounted mirror target
    #[serde(default = "default_mirror_root")]
    pub root: PathBuf,
    /// Attempts per upload before it is reported failed (default: 3)
    #[serde(default = "default_attempts")]
    pub put_attempts: u32,
    /// SFTP server to mirror to instead of the mounted root
    #[serde(default)]
    pub sftp: Option<SftpConfig>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root: default_mirror_root(),
            put_attempts: default_attempts(),
            sftp: None,
        }
    }
}

fn default_mirror_root() -> PathBuf {
    PathBuf::from("/mnt/mirror")
}

/// SFTP mirror server. The password is never read from the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SftpConfig {
    pub host: String,
    /// SSH port (default: 2022)
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub username: String,
    /// Remote directory holding the playlist directories, "" for the login
    /// directory
    #[serde(default)]
    pub root: String,
    /// Connect and I/O timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl SftpConfig {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            root: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

pub fn default_sftp_port() -> u16 {
    2022
}

/// Sanitized config for display (session cookie redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub library: LibraryConfig,
    pub provider: SanitizedProviderConfig,
    pub download: DownloadConfig,
    pub mirror: MirrorConfig,
}

/// Sanitized provider config (cookie hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProviderConfig {
    pub base_url: String,
    pub cookie_configured: bool,
    pub api_delay_ms: u64,
    pub timeout_secs: u64,
    pub audio_level: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            library: config.library.clone(),
            provider: SanitizedProviderConfig {
                base_url: config.provider.base_url.clone(),
                cookie_configured: !config.provider.cookie.is_empty(),
                api_delay_ms: config.provider.api_delay_ms,
                timeout_secs: config.provider.timeout_secs,
                audio_level: config.provider.audio_level.clone(),
            },
            download: config.download.clone(),
            mirror: config.mirror.clone(),
        }
    }
}
