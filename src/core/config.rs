//! Application configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables. Secrets are only ever expected from the
//! environment (or a `.env` file loaded by the binary).

use crate::core::error::{AmpError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Scopes needed for search, playback control, playlists and library
pub const DEFAULT_SCOPES: &[&str] = &[
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "playlist-modify-private",
    "playlist-modify-public",
    "user-library-modify",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AmpConfig {
    pub llm: LlmConfig,
    pub spotify: SpotifyConfig,
    pub session: SessionConfig,
    /// Default tracing level for the `amp` target
    pub log_level: String,
    /// Append logs to this file instead of stderr
    pub log_file: Option<PathBuf>,
}

/// Hosted language model settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    /// Anthropic messages endpoint or any OpenAI-compatible chat endpoint
    pub api_url: String,
    pub model: String,
    /// The answer is one short line, so this stays small
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: "https://api.anthropic.com/v1/messages".into(),
            model: "claude-3-haiku-20240307".into(),
            max_tokens: 100,
            timeout_secs: 10,
        }
    }
}

/// Streaming service (Spotify Web API) settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Where the OAuth token (including refresh token) is cached
    pub token_cache: PathBuf,
    pub api_base: String,
    pub accounts_base: String,
    pub timeout_secs: u64,
    /// Fixed delay before replaying a 429/503 response once
    pub retry_backoff_ms: u64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8888/callback".into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            token_cache: PathBuf::from(".spotify_cache"),
            api_base: "https://api.spotify.com/v1".into(),
            accounts_base: "https://accounts.spotify.com".into(),
            timeout_secs: 5,
            retry_backoff_ms: 1000,
        }
    }
}

/// Session and dispatch tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum turns kept in session history (oldest evicted first)
    pub history_len: usize,
    /// Turns summarized into each extraction prompt
    pub context_turns: usize,
    pub search_limit: u32,
    pub playlist_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_len: 20,
            context_turns: 3,
            search_limit: 5,
            playlist_size: 20,
        }
    }
}

impl AmpConfig {
    /// Load defaults, then the TOML file (if given), then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        if config.log_level.is_empty() {
            config.log_level = "warn".into();
        }
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AmpError::Config(format!("invalid config file: {}", e)))
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("ANTHROPIC_API_KEY").or_else(|| get("LLM_API_KEY")) {
            self.llm.api_key = key;
        }
        if let Some(url) = get("LLM_API_URL") {
            self.llm.api_url = url;
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(id) = get("SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = id;
        }
        if let Some(secret) = get("SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = secret;
        }
        if let Some(uri) = get("SPOTIFY_REDIRECT_URI") {
            self.spotify.redirect_uri = uri;
        }
        if let Some(cache) = get("AMP_TOKEN_CACHE") {
            self.spotify.token_cache = PathBuf::from(cache);
        }
        if let Some(level) = get("AMP_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(file) = get("AMP_LOG_FILE") {
            self.log_file = Some(PathBuf::from(file));
        }
    }

    /// Validate configuration, reporting every problem at once
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut problems = Vec::new();

        if self.llm.api_key.is_empty() {
            problems.push("ANTHROPIC_API_KEY (or LLM_API_KEY) is required".to_string());
        }
        if self.spotify.client_id.is_empty() {
            problems.push("SPOTIFY_CLIENT_ID is required".to_string());
        }
        if self.spotify.client_secret.is_empty() {
            problems.push("SPOTIFY_CLIENT_SECRET is required".to_string());
        }
        if self.llm.timeout_secs == 0 || self.spotify.timeout_secs == 0 {
            problems.push("timeouts must be at least one second".to_string());
        }
        if self.session.history_len == 0 {
            problems.push("session.history_len must be positive".to_string());
        }
        if self.session.context_turns > self.session.history_len {
            problems.push(format!(
                "session.context_turns ({}) should be <= session.history_len ({})",
                self.session.context_turns, self.session.history_len
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}
