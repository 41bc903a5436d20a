//! HTTP provider for NeteaseCloudMusicApi-compatible servers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{COOKIE, REFERER};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::throttle::Throttle;
use super::types::{
    AccountSnapshot, AudioStreamInfo, Lyrics, PlaylistEntry, PlaylistInfo, Session,
};
use super::{ProviderError, SourceProvider};
use crate::catalog::Track;
use crate::config::ProviderConfig;

/// Tracks requested per `/playlist/track/all` page.
const TRACK_PAGE_SIZE: usize = 500;
/// Playlists requested from `/user/playlist`.
const USER_PLAYLIST_LIMIT: u32 = 1000;
const REFERER_URL: &str = "https://music.163.com/";

/// Provider backed by a NeteaseCloudMusicApi HTTP server.
///
/// Every request, including artwork and audio downloads, goes through the
/// same [`Throttle`].
pub struct HttpProvider {
    client: Client,
    base_url: String,
    cookie: String,
    audio_level: String,
    throttle: Throttle,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!("cloudtune/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie: config.cookie.clone(),
            audio_level: config.audio_level.clone(),
            throttle: Throttle::from_millis(config.api_delay_ms),
        })
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        if self.cookie.is_empty() {
            request
        } else {
            request.header(COOKIE, format!("MUSIC_U={}", self.cookie))
        }
    }

    /// Calls an API endpoint and returns the body once its code is checked.
    async fn get_api(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        self.throttle.wait().await;

        let url = format!("{}{}", self.base_url, path);
        debug!("Provider request: {} {:?}", path, query);

        let response = self
            .with_session(self.client.get(&url).query(query))
            .send()
            .await?;

        let status = response.status();
        if status == 404 {
            return Err(ProviderError::NotFound(path.to_string()));
        }

        // Error responses still carry a JSON body with a code
        let body: Value = response.json().await.map_err(|e| {
            ProviderError::Parse(format!(
                "{} returned a non-JSON body (HTTP {}): {}",
                path, status, e
            ))
        })?;
        check_code(&body)?;
        Ok(body)
    }

    /// Plain GET against an absolute URL (CDN assets).
    async fn get_asset(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        self.throttle.wait().await;
        debug!("Provider asset: {}", url);

        let response = self
            .client
            .get(url)
            .header(REFERER, REFERER_URL)
            .send()
            .await?;
        let status = response.status();
        if status == 404 {
            return Err(ProviderError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(i64::from(status.as_u16()), body));
        }
        Ok(response)
    }
}

#[async_trait]
impl SourceProvider for HttpProvider {
    fn name(&self) -> &str {
        "netease-http"
    }

    async fn acquire_session(&self) -> Result<Session, ProviderError> {
        let body = self.get_api("/login/status", &[]).await?;
        match parse_session(&body) {
            Err(ProviderError::NotLoggedIn) => {
                // Some server versions only fill the profile in /user/account
                debug!("No profile in login status, asking /user/account");
                let body = self.get_api("/user/account", &[]).await?;
                parse_session(&body)
            }
            result => result,
        }
    }

    async fn fetch_track_detail(&self, track_id: u64) -> Result<Track, ProviderError> {
        let body = self
            .get_api("/song/detail", &[("ids", track_id.to_string())])
            .await?;
        parse_track_detail(track_id, body)
    }

    async fn fetch_lyrics(&self, track_id: u64) -> Result<Lyrics, ProviderError> {
        let body = self.get_api("/lyric", &[("id", track_id.to_string())]).await?;
        Ok(parse_lyrics(body))
    }

    async fn fetch_audio_stream_info(
        &self,
        track_id: u64,
    ) -> Result<AudioStreamInfo, ProviderError> {
        let body = self
            .get_api(
                "/song/url/v1",
                &[
                    ("id", track_id.to_string()),
                    ("level", self.audio_level.clone()),
                ],
            )
            .await?;
        parse_stream_info(track_id, body)
    }

    async fn fetch_playlist_info(&self, playlist_id: u64) -> Result<PlaylistInfo, ProviderError> {
        let mut body = self
            .get_api("/playlist/detail", &[("id", playlist_id.to_string())])
            .await?;
        let playlist = body
            .get_mut("playlist")
            .filter(|p| !p.is_null())
            .map(Value::take)
            .ok_or_else(|| ProviderError::NotFound(format!("playlist {}", playlist_id)))?;
        serde_json::from_value(playlist).map_err(|e| {
            ProviderError::Parse(format!("Failed to parse playlist {}: {}", playlist_id, e))
        })
    }

    async fn fetch_playlist_track_ids(
        &self,
        playlist_id: u64,
    ) -> Result<Vec<PlaylistEntry>, ProviderError> {
        let mut entries: Vec<PlaylistEntry> = Vec::new();
        loop {
            let body = self
                .get_api(
                    "/playlist/track/all",
                    &[
                        ("id", playlist_id.to_string()),
                        ("limit", TRACK_PAGE_SIZE.to_string()),
                        ("offset", entries.len().to_string()),
                    ],
                )
                .await?;
            let page = parse_entries(&body, "songs")?;
            let page_len = page.len();
            entries.extend(page);
            if page_len < TRACK_PAGE_SIZE {
                break;
            }
        }
        Ok(entries)
    }

    async fn fetch_account(&self) -> Result<AccountSnapshot, ProviderError> {
        let session = self.acquire_session().await?;
        let body = self
            .get_api(
                "/user/playlist",
                &[
                    ("uid", session.user_id.to_string()),
                    ("limit", USER_PLAYLIST_LIMIT.to_string()),
                ],
            )
            .await?;
        let playlists = parse_entries(&body, "playlist")?;
        if body.get("more").and_then(Value::as_bool).unwrap_or(false) {
            warn!(
                "Account {} has more than {} playlists, the rest are ignored",
                session.user_id, USER_PLAYLIST_LIMIT
            );
        }

        Ok(AccountSnapshot {
            user_id: session.user_id,
            name: session.nickname,
            playlists,
        })
    }

    async fn fetch_artwork(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self.get_asset(url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn download_audio(&self, url: &str, dest: &Path) -> Result<u64, ProviderError> {
        let response = self.get_asset(url).await?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(dest);
        let total_bytes = match write_body(response, &partial).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&partial, dest).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        debug!("Downloaded {} bytes to {}", total_bytes, dest.display());
        Ok(total_bytes)
    }
}

/// Streams a response body into `path`.
async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64, ProviderError> {
    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut total_bytes = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        total_bytes += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(total_bytes)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Reads the response code, which `/login/status` nests under `data`.
fn response_code(body: &Value) -> Option<i64> {
    body.get("code")
        .and_then(Value::as_i64)
        .or_else(|| body.pointer("/data/code").and_then(Value::as_i64))
}

fn check_code(body: &Value) -> Result<(), ProviderError> {
    match response_code(body) {
        Some(200) => Ok(()),
        code => {
            let message = ["message", "msg"]
                .iter()
                .find_map(|k| body.get(*k).and_then(Value::as_str))
                .unwrap_or("no message")
                .to_string();
            Err(ProviderError::Api {
                code: code.unwrap_or(0),
                message,
            })
        }
    }
}

fn parse_session(body: &Value) -> Result<Session, ProviderError> {
    let profile = body
        .pointer("/data/profile")
        .or_else(|| body.get("profile"))
        .filter(|p| !p.is_null())
        .ok_or(ProviderError::NotLoggedIn)?;

    let user_id = profile
        .get("userId")
        .and_then(Value::as_u64)
        .ok_or_else(|| ProviderError::Parse("profile without userId".to_string()))?;
    let nickname = profile
        .get("nickname")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Session { user_id, nickname })
}

fn parse_track_detail(track_id: u64, mut body: Value) -> Result<Track, ProviderError> {
    let song = body
        .get_mut("songs")
        .and_then(Value::as_array_mut)
        .and_then(|songs| songs.iter_mut().next())
        .map(Value::take)
        .ok_or_else(|| ProviderError::NotFound(format!("track {}", track_id)))?;
    serde_json::from_value(song)
        .map_err(|e| ProviderError::Parse(format!("Failed to parse track {}: {}", track_id, e)))
}

fn parse_lyrics(body: Value) -> Lyrics {
    let text = body
        .pointer("/lrc/lyric")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Lyrics { text, raw: body }
}

fn parse_stream_info(track_id: u64, mut body: Value) -> Result<AudioStreamInfo, ProviderError> {
    let info = body
        .get_mut("data")
        .and_then(Value::as_array_mut)
        .and_then(|data| data.iter_mut().next())
        .map(Value::take)
        .ok_or_else(|| ProviderError::NotFound(format!("stream info for track {}", track_id)))?;
    serde_json::from_value(info).map_err(|e| {
        ProviderError::Parse(format!("Failed to parse stream info for {}: {}", track_id, e))
    })
}

fn parse_entries(body: &Value, key: &str) -> Result<Vec<PlaylistEntry>, ProviderError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(list) => Vec::<PlaylistEntry>::deserialize(list)
            .map_err(|e| ProviderError::Parse(format!("Failed to parse `{}` list: {}", key, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_code() {
        assert!(check_code(&json!({"code": 200})).is_ok());
        assert!(check_code(&json!({"data": {"code": 200}})).is_ok());

        match check_code(&json!({"code": 301, "msg": "need login"})) {
            Err(ProviderError::Api { code, message }) => {
                assert_eq!(code, 301);
                assert_eq!(message, "need login");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            check_code(&json!({})),
            Err(ProviderError::Api { code: 0, .. })
        ));
    }

    #[test]
    fn test_parse_session() {
        let body = json!({"data": {"code": 200, "profile": {"userId": 42, "nickname": "me"}}});
        assert_eq!(
            parse_session(&body).unwrap(),
            Session {
                user_id: 42,
                nickname: "me".to_string()
            }
        );

        let anonymous = json!({"data": {"code": 200, "account": null, "profile": null}});
        assert!(matches!(
            parse_session(&anonymous),
            Err(ProviderError::NotLoggedIn)
        ));
    }

    #[test]
    fn test_parse_track_detail() {
        let body = json!({
            "code": 200,
            "songs": [{"id": 7, "name": "Song", "ar": [{"id": 1, "name": "A"}], "al": {"name": "B"}, "publishTime": 0}],
            "privileges": []
        });
        let track = parse_track_detail(7, body).unwrap();
        assert_eq!(track.std_name(false), "A - Song");

        let empty = json!({"code": 200, "songs": []});
        assert!(matches!(
            parse_track_detail(7, empty),
            Err(ProviderError::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_lyrics() {
        let lyrics = parse_lyrics(json!({"code": 200, "lrc": {"version": 3, "lyric": "[00:01.00]hi"}}));
        assert_eq!(lyrics.text, "[00:01.00]hi");
        assert_eq!(lyrics.raw["lrc"]["version"], 3);

        let instrumental = parse_lyrics(json!({"code": 200, "nolyric": true}));
        assert!(instrumental.text.is_empty());
    }

    #[test]
    fn test_parse_stream_info() {
        let body = json!({"code": 200, "data": [{"id": 9, "url": null, "freeTrialInfo": null, "code": 404}]});
        let info = parse_stream_info(9, body).unwrap();
        assert!(info.url.is_none());
        assert!(!info.is_restricted());
        assert_eq!(info.extra.get("code"), Some(&json!(404)));
    }

    #[test]
    fn test_parse_entries() {
        let body = json!({"playlist": [{"id": 1, "name": "Liked", "trackCount": 3}, {"id": 2, "name": "Other"}]});
        let entries = parse_entries(&body, "playlist").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "Other");
        assert!(parse_entries(&json!({}), "songs").unwrap().is_empty());
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/lib/musics/1.mp3")),
            PathBuf::from("/lib/musics/1.mp3.part")
        );
    }

    /// Serves one canned HTTP response on a local port.
    async fn serve_once(response: &'static [u8]) -> String {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/audio.mp3", addr)
    }

    #[tokio::test]
    async fn test_download_audio_writes_file() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello")
            .await;
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("musics").join("1.mp3");
        let provider = HttpProvider::new(&ProviderConfig::default()).unwrap();

        let bytes = provider.download_audio(&url, &dest).await.unwrap();
        assert_eq!(bytes, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_audio_failed_rename_removes_partial() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello")
            .await;
        let temp = tempfile::TempDir::new().unwrap();
        // A non-empty directory in the way makes the final rename fail
        let dest = temp.path().join("1.mp3");
        std::fs::create_dir_all(dest.join("occupied")).unwrap();
        let provider = HttpProvider::new(&ProviderConfig::default()).unwrap();

        let result = provider.download_audio(&url, &dest).await;
        assert!(matches!(result, Err(ProviderError::Io(_))));
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_audio_truncated_body_removes_partial() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nhello")
            .await;
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("1.mp3");
        let provider = HttpProvider::new(&ProviderConfig::default()).unwrap();

        assert!(provider.download_audio(&url, &dest).await.is_err());
        assert!(!partial_path(&dest).exists());
        assert!(!dest.exists());
    }
}
