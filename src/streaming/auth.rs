//! OAuth2 authorization-code flow for the Spotify Web API
//!
//! The token (with its refresh token) is cached as JSON on disk. Access
//! tokens are refreshed shortly before expiry, or on demand after a 401.
//! Refreshes are serialized by an async mutex so only one is ever in flight.

use crate::core::config::SpotifyConfig;
use crate::core::error::{AmpError, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Refresh this many seconds before the reported expiry
const EXPIRY_SKEW_SECS: u64 = 60;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: u64,
    #[serde(default)]
    pub scope: String,
}

impl Token {
    pub fn is_expired_at(&self, now: u64) -> bool {
        now + EXPIRY_SKEW_SECS >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: u64,
    #[serde(default)]
    scope: String,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> Token {
        Token {
            access_token: self.access_token,
            // Refresh responses may omit the refresh token; keep the old one
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: now_secs() + self.expires_in,
            scope: self.scope,
        }
    }
}

/// Token persisted between runs
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no token has been cached yet
    pub fn load(&self) -> Result<Option<Token>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, token: &Token) -> Result<()> {
        let raw = serde_json::to_string_pretty(token)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// Holds the scoped credential and its refresh lifecycle
pub struct SpotifyAuth {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    accounts_base: String,
    cache: TokenCache,
    token: Mutex<Option<Token>>,
}

impl SpotifyAuth {
    /// Build from config, loading any cached token
    pub fn from_config(config: &SpotifyConfig) -> Result<Self> {
        let cache = TokenCache::new(&config.token_cache);
        let token = match cache.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, path = %cache.path().display(), "ignoring unreadable token cache");
                None
            }
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AmpError::Config(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            accounts_base: config.accounts_base.trim_end_matches('/').to_string(),
            cache,
            token: Mutex::new(token),
        })
    }

    pub async fn is_authorized(&self) -> bool {
        self.token.lock().await.is_some()
    }

    /// URL the user opens to grant access
    pub fn authorize_url(&self, state: &str) -> Result<Url> {
        let scope = self.scopes.join(" ");
        Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AmpError::Config(format!("invalid accounts URL: {}", e)))
    }

    /// Run the interactive flow. `ask` shows a message and returns the user's reply.
    pub async fn authorize_interactive<F>(&self, ask: F) -> Result<()>
    where
        F: FnOnce(&str) -> std::io::Result<String>,
    {
        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let url = self.authorize_url(&state)?;
        let message = format!(
            "Open this URL in your browser and approve access:\n\n  {}\n\nThen paste the full URL you were redirected to:",
            url
        );
        let reply = ask(&message)?;
        let code = parse_callback(reply.trim(), &state)?;
        self.exchange_code(&code).await?;
        info!("authorized with streaming service");
        Ok(())
    }

    async fn exchange_code(&self, code: &str) -> Result<()> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;
        let token = response.into_token(None);
        self.store(&token);
        *self.token.lock().await = Some(token);
        Ok(())
    }

    /// Current access token, refreshing first when it is about to expire
    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        let token = guard
            .as_ref()
            .ok_or_else(|| AmpError::Auth("not authorized yet, run `amp --login`".into()))?;
        if !token.is_expired() {
            return Ok(token.access_token.clone());
        }
        debug!("access token expired, refreshing");
        let refreshed = self.refresh(token).await?;
        let access = refreshed.access_token.clone();
        *guard = Some(refreshed);
        Ok(access)
    }

    /// Refresh after a 401 for `stale`
    ///
    /// When another caller already replaced `stale`, the newer token is
    /// returned without a second refresh.
    pub async fn force_refresh(&self, stale: &str) -> Result<String> {
        let mut guard = self.token.lock().await;
        let token = guard
            .as_ref()
            .ok_or_else(|| AmpError::Auth("not authorized yet, run `amp --login`".into()))?;
        if token.access_token != stale {
            return Ok(token.access_token.clone());
        }
        let refreshed = self.refresh(token).await?;
        let access = refreshed.access_token.clone();
        *guard = Some(refreshed);
        Ok(access)
    }

    async fn refresh(&self, token: &Token) -> Result<Token> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| AmpError::Auth("no refresh token cached, please log in again".into()))?;
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await
            .map_err(|e| match e {
                AmpError::Auth(_) => e,
                other => AmpError::Auth(format!("token refresh failed: {}", other)),
            })?;
        let refreshed = response.into_token(token.refresh_token.clone());
        self.store(&refreshed);
        info!("refreshed access token");
        Ok(refreshed)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AmpError::from_transport("accounts service", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AmpError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AmpError::Auth(format!("unreadable token response: {}", e)))
    }

    fn store(&self, token: &Token) {
        if let Err(e) = self.cache.save(token) {
            warn!(error = %e, "could not write token cache");
        }
    }

    #[cfg(test)]
    pub(crate) async fn set_token(&self, token: Option<Token>) {
        *self.token.lock().await = token;
    }
}

/// Pull the authorization code out of the redirect URL, checking `state`
pub fn parse_callback(redirected: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(redirected)
        .map_err(|_| AmpError::Auth("that does not look like the redirect URL".into()))?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(AmpError::Auth(format!("authorization denied: {}", value))),
            _ => {}
        }
    }
    if state.as_deref() != Some(expected_state) {
        return Err(AmpError::Auth("state mismatch in redirect URL".into()));
    }
    code.ok_or_else(|| AmpError::Auth("redirect URL has no authorization code".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(cache: &Path) -> SpotifyConfig {
        SpotifyConfig {
            client_id: "client-123".into(),
            client_secret: "secret".into(),
            token_cache: cache.to_path_buf(),
            ..SpotifyConfig::default()
        }
    }

    fn token(access: &str, expires_at: u64) -> Token {
        Token {
            access_token: access.into(),
            refresh_token: Some("refresh".into()),
            expires_at,
            scope: String::new(),
        }
    }

    #[test]
    fn test_token_expiry_with_skew() {
        let t = token("a", 1_000);
        assert!(!t.is_expired_at(900));
        assert!(t.is_expired_at(950));
        assert!(t.is_expired_at(2_000));
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        assert!(cache.load().unwrap().is_none());

        let t = token("abc", 42);
        cache.save(&t).unwrap();
        assert_eq!(cache.load().unwrap(), Some(t));
    }

    #[test]
    fn test_authorize_url() {
        let dir = tempfile::tempdir().unwrap();
        let auth = SpotifyAuth::from_config(&config(&dir.path().join("t.json"))).unwrap();
        let url = auth.authorize_url("xyz").unwrap();
        assert!(url.as_str().starts_with("https://accounts.spotify.com/authorize?"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "client-123".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
        assert!(pairs
            .iter()
            .any(|(k, v)| k == "scope" && v.contains("user-modify-playback-state")));
    }

    #[test]
    fn test_parse_callback() {
        let code = parse_callback("http://localhost:8888/callback?code=AQB&state=s1", "s1").unwrap();
        assert_eq!(code, "AQB");

        let err = parse_callback("http://localhost:8888/callback?code=AQB&state=other", "s1");
        assert!(matches!(err, Err(AmpError::Auth(_))));

        let err = parse_callback("http://localhost:8888/callback?error=access_denied&state=s1", "s1");
        assert!(matches!(err, Err(AmpError::Auth(ref m)) if m.contains("access_denied")));

        assert!(parse_callback("not a url", "s1").is_err());
    }

    #[tokio::test]
    async fn test_access_token_without_login() {
        let dir = tempfile::tempdir().unwrap();
        let auth = SpotifyAuth::from_config(&config(&dir.path().join("t.json"))).unwrap();
        assert!(!auth.is_authorized().await);
        assert!(matches!(auth.access_token().await, Err(AmpError::Auth(_))));
    }

    #[tokio::test]
    async fn test_valid_cached_token_used_without_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        TokenCache::new(&path)
            .save(&token("cached", now_secs() + 3_600))
            .unwrap();
        let auth = SpotifyAuth::from_config(&config(&path)).unwrap();
        assert_eq!(auth.access_token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn test_force_refresh_reuses_newer_token() {
        let dir = tempfile::tempdir().unwrap();
        let auth = SpotifyAuth::from_config(&config(&dir.path().join("t.json"))).unwrap();
        auth.set_token(Some(token("newer", now_secs() + 3_600))).await;
        assert_eq!(auth.force_refresh("stale").await.unwrap(), "newer");
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let auth = SpotifyAuth::from_config(&config(&dir.path().join("t.json"))).unwrap();
        let mut expired = token("old", 0);
        expired.refresh_token = None;
        auth.set_token(Some(expired)).await;
        assert!(matches!(auth.access_token().await, Err(AmpError::Auth(_))));
    }
}
