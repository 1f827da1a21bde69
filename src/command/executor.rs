//! Command execution - maps an intent onto streaming service calls
//!
//! The dispatcher does no language understanding of its own. Every error is
//! caught here and turned into an [`ActionResult`].

use crate::command::resolver::TrackResolver;
use crate::core::config::SessionConfig;
use crate::core::error::{AmpError, ErrorKind, Result};
use crate::core::types::{Track, Utterance, UtteranceId};
use crate::llm::extractor::DEFAULT_MOOD;
use crate::llm::parser::{Action, Intent};
use crate::streaming::StreamingService;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum tracks a generated playlist may hold
pub const MAX_PLAYLIST_SIZE: usize = 100;

/// Longest default playlist name
const MAX_PLAYLIST_NAME: usize = 60;

/// Spotify caps search pages at 50
const MAX_SEARCH_PAGE: usize = 50;

/// Outcome of one dispatched utterance, tagged with the utterance it answers
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub utterance_id: UtteranceId,
    pub success: bool,
    pub message: String,
    pub error_kind: Option<ErrorKind>,
    pub warning: Option<String>,
    pub track: Option<Track>,
}

impl ActionResult {
    pub fn success(utterance_id: UtteranceId, message: impl Into<String>) -> Self {
        Self {
            utterance_id,
            success: true,
            message: message.into(),
            error_kind: None,
            warning: None,
            track: None,
        }
    }

    pub fn from_error(utterance_id: UtteranceId, err: &AmpError) -> Self {
        let message = match err {
            AmpError::NoActiveDevice => {
                "No active device. Open the Spotify app on any device, start playing something, then try again."
                    .to_string()
            }
            AmpError::Extraction(_) => {
                format!("{}. Try rephrasing, e.g. \"play some jazz\".", err)
            }
            AmpError::Validation(m) => m.clone(),
            other => other.to_string(),
        };
        Self {
            utterance_id,
            success: false,
            message,
            error_kind: Some(err.kind()),
            warning: None,
            track: None,
        }
    }
}

/// Successful result before it is tagged
#[derive(Debug, Default)]
struct Outcome {
    message: String,
    warning: Option<String>,
    track: Option<Track>,
}

impl Outcome {
    fn say(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    fn with_track(mut self, track: Track) -> Self {
        self.track = Some(track);
        self
    }

    fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }

    fn into_result(self, utterance_id: UtteranceId) -> ActionResult {
        ActionResult {
            utterance_id,
            success: true,
            message: self.message,
            error_kind: None,
            warning: self.warning,
            track: self.track,
        }
    }
}

/// Executes intents against a streaming service
pub struct Dispatcher {
    service: Arc<dyn StreamingService>,
    search_limit: u32,
    playlist_size: usize,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn StreamingService>, search_limit: u32, playlist_size: usize) -> Self {
        Self {
            service,
            search_limit: search_limit.max(1),
            playlist_size: playlist_size.clamp(1, MAX_PLAYLIST_SIZE),
        }
    }

    pub fn from_config(service: Arc<dyn StreamingService>, config: &SessionConfig) -> Self {
        Self::new(service, config.search_limit, config.playlist_size as usize)
    }

    /// Execute an intent, never failing: errors come back as unsuccessful results
    pub async fn dispatch(&self, utterance: &Utterance, intent: &Intent) -> ActionResult {
        let id = utterance.id();
        match self.run(utterance, intent).await {
            Ok(outcome) => {
                info!(utterance = %id, action = %intent.action, "action succeeded");
                outcome.into_result(id)
            }
            Err(e) => {
                warn!(utterance = %id, action = %intent.action, error = %e, "action failed");
                ActionResult::from_error(id, &e)
            }
        }
    }

    async fn run(&self, utterance: &Utterance, intent: &Intent) -> Result<Outcome> {
        if intent.action.needs_device() {
            self.require_device().await?;
        }

        match intent.action {
            Action::Search => self.search(intent).await,
            Action::Play => self.play(intent).await,
            Action::Pause => {
                self.service.pause().await?;
                Ok(Outcome::say("Paused"))
            }
            Action::Skip => {
                self.service.skip_next().await?;
                Ok(Outcome::say("Skipped to the next track"))
            }
            Action::Previous => {
                self.service.skip_previous().await?;
                Ok(Outcome::say("Back to the previous track"))
            }
            Action::SetVolume => self.set_volume(intent).await,
            Action::Queue => self.queue(intent).await,
            Action::CreatePlaylist => self.create_playlist(utterance, intent).await,
            Action::Like => self.like().await,
            Action::ShuffleToggle => self.shuffle(intent).await,
            Action::NowPlaying => self.now_playing().await,
        }
    }

    async fn require_device(&self) -> Result<()> {
        match self.service.active_device().await? {
            Some(device) => {
                debug!(device = %device.name, "active device");
                Ok(())
            }
            None => Err(AmpError::NoActiveDevice),
        }
    }

    fn resolver(&self) -> TrackResolver<'_> {
        TrackResolver::new(self.service.as_ref(), self.search_limit)
    }

    async fn search(&self, intent: &Intent) -> Result<Outcome> {
        let query = intent
            .param("query")
            .ok_or_else(|| AmpError::Validation("nothing to search for".into()))?;
        let tracks = self.service.search(query, self.search_limit).await?;
        if tracks.is_empty() {
            return Ok(Outcome::say(format!("No results found for \"{}\"", query)));
        }

        let mut message = format!("Found {} tracks for \"{}\":", tracks.len(), query);
        for (i, track) in tracks.iter().enumerate() {
            message.push_str(&format!("\n  {}. {}", i + 1, track));
        }
        let mut first = tracks.into_iter().next();
        if let Some(track) = first.as_mut() {
            if track.genre.is_none() {
                track.genre = intent.param("genre").map(str::to_string);
            }
        }
        let outcome = Outcome::say(message);
        Ok(match first {
            Some(track) => outcome.with_track(track),
            None => outcome,
        })
    }

    async fn play(&self, intent: &Intent) -> Result<Outcome> {
        if intent.param("query").is_none() {
            self.service.start_playback(None).await?;
            return Ok(Outcome::say("Resumed playback"));
        }
        let resolution = self.resolver().resolve(intent).await?;
        self.service
            .start_playback(Some(&resolution.track.uri))
            .await?;
        let warning = join_notes(&resolution.notes);
        Ok(Outcome::say(format!("Playing {}", resolution.track))
            .with_track(resolution.track)
            .with_warning(warning))
    }

    async fn queue(&self, intent: &Intent) -> Result<Outcome> {
        let resolution = self.resolver().resolve(intent).await?;
        self.service.enqueue(&resolution.track.uri).await?;
        let warning = join_notes(&resolution.notes);
        Ok(Outcome::say(format!("Queued {}", resolution.track))
            .with_track(resolution.track)
            .with_warning(warning))
    }

    async fn set_volume(&self, intent: &Intent) -> Result<Outcome> {
        let raw = intent
            .param("level")
            .ok_or_else(|| AmpError::Validation("Volume level missing, say e.g. \"volume 50\"".into()))?;
        let (level, warning) = parse_volume(raw)?;
        self.service.set_volume(level).await?;
        let message = match &warning {
            Some(w) => format!("Volume set to {}% ({})", level, w),
            None => format!("Volume set to {}%", level),
        };
        Ok(Outcome::say(message).with_warning(warning))
    }

    async fn create_playlist(&self, utterance: &Utterance, intent: &Intent) -> Result<Outcome> {
        let name = intent
            .param("name")
            .map(str::to_string)
            .unwrap_or_else(|| default_playlist_name(utterance.text()));
        let count = match intent.param("count") {
            Some(raw) => parse_count(raw)?,
            None => self.playlist_size,
        };
        let seeds = playlist_seeds(intent);
        let vibe = intent
            .param("mood")
            .map(str::to_string)
            .unwrap_or_else(|| seeds.join(", "));
        let description = format!("Created by AMP - {} vibes", vibe);

        let per_seed = count.div_ceil(seeds.len()).clamp(1, MAX_SEARCH_PAGE) as u32;
        let mut seen = HashSet::new();
        let mut uris = Vec::new();
        for seed in &seeds {
            if uris.len() >= count {
                break;
            }
            let tracks = self.service.search(seed, per_seed).await?;
            debug!(%seed, found = tracks.len(), "playlist seed search");
            for track in tracks {
                if uris.len() >= count {
                    break;
                }
                if seen.insert(track.uri.clone()) {
                    uris.push(track.uri);
                }
            }
        }
        if uris.is_empty() {
            return Err(AmpError::Validation(format!(
                "No tracks found for {}",
                seeds.join(", ")
            )));
        }

        let playlist = self.service.create_playlist(&name, &description).await?;
        self.service.add_to_playlist(&playlist.id, &uris).await?;
        info!(playlist = %playlist.id, tracks = uris.len(), "created playlist");

        let mut message = format!("Created playlist \"{}\" with {} tracks", playlist.name, uris.len());
        if let Some(url) = &playlist.url {
            message.push_str(&format!("\n  {}", url));
        }
        Ok(Outcome::say(message))
    }

    async fn like(&self) -> Result<Outcome> {
        let track = self
            .service
            .like_current()
            .await?
            .ok_or_else(|| AmpError::Validation("Nothing is playing".into()))?;
        Ok(Outcome::say(format!("Saved {} to your library", track)).with_track(track))
    }

    async fn shuffle(&self, intent: &Intent) -> Result<Outcome> {
        let requested = intent.param("state").map(parse_switch).transpose()?;
        let enabled = self.service.toggle_shuffle(requested).await?;
        Ok(Outcome::say(if enabled { "Shuffle on" } else { "Shuffle off" }))
    }

    async fn now_playing(&self) -> Result<Outcome> {
        let now = self
            .service
            .currently_playing()
            .await?
            .ok_or_else(|| AmpError::Validation("Nothing is playing".into()))?;
        Ok(Outcome::say(now.describe()).with_track(now.track))
    }
}

/// Parse a volume level, clamping out-of-range values with a warning
pub fn parse_volume(raw: &str) -> Result<(u8, Option<String>)> {
    let cleaned = raw.trim().trim_end_matches('%').trim();
    let value: i64 = cleaned
        .parse::<i64>()
        .ok()
        .or_else(|| {
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f.round() as i64)
        })
        .ok_or_else(|| {
            AmpError::Validation(format!("Volume must be a number from 0 to 100, got \"{}\"", raw))
        })?;
    let clamped = value.clamp(0, 100);
    let warning = (clamped != value)
        .then(|| format!("requested {} is out of range, clamped to {}", value, clamped));
    Ok((clamped as u8, warning))
}

fn parse_count(raw: &str) -> Result<usize> {
    let n: usize = raw
        .trim()
        .parse()
        .map_err(|_| AmpError::Validation(format!("Track count must be a number, got \"{}\"", raw)))?;
    Ok(n.clamp(1, MAX_PLAYLIST_SIZE))
}

fn parse_switch(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" | "enable" | "enabled" => Ok(true),
        "off" | "false" | "no" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(AmpError::Validation(format!("Shuffle state must be on or off, got \"{}\"", raw))),
    }
}

/// `AMP: <utterance>`, cut to 60 characters
pub fn default_playlist_name(utterance: &str) -> String {
    let full = format!("AMP: {}", utterance.trim());
    full.chars().take(MAX_PLAYLIST_NAME).collect::<String>().trim_end().to_string()
}

/// Search terms for playlist tracks, most specific first
fn playlist_seeds(intent: &Intent) -> Vec<String> {
    let listed: Vec<String> = intent
        .param("seeds")
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if !listed.is_empty() {
        return listed;
    }
    let single = ["genre", "mood", "query"]
        .iter()
        .find_map(|key| intent.param(key))
        .unwrap_or(DEFAULT_MOOD);
    vec![single.to_string()]
}

fn join_notes(notes: &[String]) -> Option<String> {
    (!notes.is_empty()).then(|| notes.join("; "))
}
