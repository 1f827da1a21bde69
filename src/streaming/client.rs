//! Spotify Web API client
//!
//! Every request goes through [`SpotifyClient::call`], which owns the retry
//! policy. A request is sent at most twice: a 401 refreshes the token and
//! replays, a 429/503 waits the backoff and replays. The replay's answer is
//! final whatever its status. Nothing else is retried.

use crate::core::config::SpotifyConfig;
use crate::core::error::{AmpError, Result};
use crate::core::types::Track;
use crate::streaming::auth::SpotifyAuth;
use crate::streaming::models::{
    DevicesResponse, ErrorEnvelope, PlaybackState, PlaylistObject, SearchResponse, UserProfile,
};
use crate::streaming::{Device, NowPlaying, Playlist, StreamingService};
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Spotify accepts at most this many URIs per add-tracks request
const MAX_URIS_PER_REQUEST: usize = 100;

const NO_ACTIVE_DEVICE_REASON: &str = "NO_ACTIVE_DEVICE";

pub struct SpotifyClient {
    http: Client,
    auth: Arc<SpotifyAuth>,
    api_base: String,
    backoff: Duration,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, auth: Arc<SpotifyAuth>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AmpError::Config(format!("could not build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            auth,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn auth(&self) -> &Arc<SpotifyAuth> {
        &self.auth
    }

    /// Send one API request and return the raw body of the 2xx response
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String> {
        let url = format!("{}{}", self.api_base, path);
        let mut token = self.auth.access_token().await?;
        let mut replayed = false;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .query(query);
            request = match body {
                Some(body) => request.json(body),
                None if method != Method::GET => request.header(CONTENT_LENGTH, 0),
                None => request,
            };

            let response = request
                .send()
                .await
                .map_err(|e| AmpError::from_transport("streaming service", e))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| AmpError::from_transport("streaming service", e))?;
            debug!(%method, path, status = status.as_u16(), "streaming api call");

            if status.is_success() {
                return Ok(text);
            }

            if replayed {
                return Err(error_from_response(status.as_u16(), &text));
            }

            if status == StatusCode::UNAUTHORIZED {
                replayed = true;
                debug!("401 from streaming service, refreshing token");
                token = self.auth.force_refresh(&token).await?;
                continue;
            }

            let err = error_from_response(status.as_u16(), &text);
            if err.is_transient() {
                replayed = true;
                warn!(status = status.as_u16(), backoff_ms = self.backoff.as_millis() as u64, "transient upstream failure, retrying once");
                tokio::time::sleep(self.backoff).await;
                continue;
            }
            return Err(err);
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Option<T>> {
        let text = self.call(Method::GET, path, query, None).await?;
        decode(&text)
    }

    async fn command(&self, method: Method, path: &str, query: &[(&str, String)]) -> Result<()> {
        self.call(method, path, query, None).await.map(|_| ())
    }

    async fn playback_state(&self) -> Result<Option<PlaybackState>> {
        self.get("/me/player", &[]).await
    }
}

/// Empty bodies (204) decode to `None`
fn decode<T: DeserializeOwned>(text: &str) -> Result<Option<T>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

/// Map a non-2xx response to the error taxonomy
pub(crate) fn error_from_response(status: u16, body: &str) -> AmpError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let reason = parsed.as_ref().and_then(|e| e.error.reason.clone());
    let message = parsed
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {}", status));

    match status {
        404 if reason.as_deref() == Some(NO_ACTIVE_DEVICE_REASON) => AmpError::NoActiveDevice,
        401 => AmpError::Auth(message),
        _ => AmpError::Upstream { status, message },
    }
}

#[async_trait]
impl StreamingService for SpotifyClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Track>> {
        let response: Option<SearchResponse> = self
            .get(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", "track".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(response
            .map(|r| r.tracks.items.into_iter().map(Track::from).collect())
            .unwrap_or_default())
    }

    async fn active_device(&self) -> Result<Option<Device>> {
        let response: Option<DevicesResponse> = self.get("/me/player/devices", &[]).await?;
        Ok(response.and_then(|r| {
            r.devices
                .into_iter()
                .find(|d| d.is_active)
                .map(Device::from)
        }))
    }

    async fn start_playback(&self, track_uri: Option<&str>) -> Result<()> {
        let body = track_uri.map(|uri| json!({ "uris": [uri] }));
        self.call(Method::PUT, "/me/player/play", &[], body.as_ref())
            .await
            .map(|_| ())
    }

    async fn pause(&self) -> Result<()> {
        self.command(Method::PUT, "/me/player/pause", &[]).await
    }

    async fn skip_next(&self) -> Result<()> {
        self.command(Method::POST, "/me/player/next", &[]).await
    }

    async fn skip_previous(&self) -> Result<()> {
        self.command(Method::POST, "/me/player/previous", &[]).await
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        self.command(
            Method::PUT,
            "/me/player/volume",
            &[("volume_percent", percent.min(100).to_string())],
        )
        .await
    }

    async fn enqueue(&self, track_uri: &str) -> Result<()> {
        self.command(Method::POST, "/me/player/queue", &[("uri", track_uri.to_string())])
            .await
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<Playlist> {
        let profile: UserProfile = self
            .get("/me", &[])
            .await?
            .ok_or_else(|| AmpError::Upstream {
                status: 204,
                message: "empty profile response".into(),
            })?;
        let body = json!({
            "name": name,
            "description": description,
            "public": false,
        });
        let text = self
            .call(
                Method::POST,
                &format!("/users/{}/playlists", profile.id),
                &[],
                Some(&body),
            )
            .await?;
        let created: PlaylistObject = serde_json::from_str(&text)?;
        Ok(created.into())
    }

    async fn add_to_playlist(&self, playlist_id: &str, track_uris: &[String]) -> Result<()> {
        let path = format!("/playlists/{}/tracks", playlist_id);
        for chunk in track_uris.chunks(MAX_URIS_PER_REQUEST) {
            let body = json!({ "uris": chunk });
            self.call(Method::POST, &path, &[], Some(&body)).await?;
        }
        Ok(())
    }

    async fn like_current(&self) -> Result<Option<Track>> {
        let Some(now) = self.currently_playing().await? else {
            return Ok(None);
        };
        self.command(Method::PUT, "/me/tracks", &[("ids", now.track.id.clone())])
            .await?;
        Ok(Some(now.track))
    }

    async fn toggle_shuffle(&self, state: Option<bool>) -> Result<bool> {
        let target = match state {
            Some(state) => state,
            None => !self
                .playback_state()
                .await?
                .map(|s| s.shuffle_state)
                .unwrap_or(false),
        };
        self.command(Method::PUT, "/me/player/shuffle", &[("state", target.to_string())])
            .await?;
        Ok(target)
    }

    async fn currently_playing(&self) -> Result<Option<NowPlaying>> {
        let Some(state) = self.playback_state().await? else {
            return Ok(None);
        };
        Ok(state.item.map(|item| NowPlaying {
            track: item.into(),
            is_playing: state.is_playing,
            progress_ms: state.progress_ms.unwrap_or(0),
            shuffle: state.shuffle_state,
        }))
    }
}
