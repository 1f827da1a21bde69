//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// Unique identifier for a single user input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtteranceId(pub Uuid);

impl UtteranceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UtteranceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one user session (one process run for the CLI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// One raw user input. Immutable once created.
#[derive(Debug, Clone)]
pub struct Utterance {
    id: UtteranceId,
    session: SessionId,
    text: String,
    received_at: SystemTime,
}

impl Utterance {
    pub fn new(session: SessionId, text: impl Into<String>) -> Self {
        Self {
            id: UtteranceId::new(),
            session,
            text: text.into(),
            received_at: SystemTime::now(),
        }
    }

    pub fn id(&self) -> UtteranceId {
        self.id
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }
}

/// A track on the streaming service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    pub duration_ms: u64,
    /// Genre the track was requested under, when known
    pub genre: Option<String>,
}

impl Track {
    pub fn artists_str(&self) -> String {
        self.artists.join(", ")
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artists.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} by {}", self.name, self.artists_str())
        }
    }
}

/// Format milliseconds as m:ss or h:mm:ss
pub fn format_duration(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
