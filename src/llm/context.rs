//! Session history for resolving relative phrasing
//!
//! Holds the last few turns of one user session so that commands like
//! "more like this" or "skip, too slow" can be interpreted. Entries are
//! appended and never changed afterwards; the oldest entry is evicted once
//! the buffer is full.

use crate::command::ActionResult;
use crate::core::error::ErrorKind;
use crate::core::types::{Track, Utterance};
use crate::llm::parser::{Action, Intent};
use std::collections::VecDeque;

/// What a dispatched turn led to
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Succeeded {
        track: Option<Track>,
        message: String,
    },
    Failed {
        kind: Option<ErrorKind>,
        message: String,
    },
}

impl TurnOutcome {
    pub fn from_result(result: &ActionResult) -> Self {
        if result.success {
            TurnOutcome::Succeeded {
                track: result.track.clone(),
                message: result.message.clone(),
            }
        } else {
            TurnOutcome::Failed {
                kind: result.error_kind,
                message: result.message.clone(),
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TurnOutcome::Succeeded { .. })
    }

    pub fn track(&self) -> Option<&Track> {
        match self {
            TurnOutcome::Succeeded { track, .. } => track.as_ref(),
            TurnOutcome::Failed { .. } => None,
        }
    }
}

/// One recorded turn
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub utterance: Utterance,
    pub intent: Intent,
    pub outcome: TurnOutcome,
}

impl ContextEntry {
    /// "action -> outcome" line used in prompts
    pub fn summary(&self) -> String {
        let outcome = match &self.outcome {
            TurnOutcome::Succeeded {
                track: Some(track), ..
            } => format!("ok, {}", track),
            TurnOutcome::Succeeded { message, .. } => format!("ok, {}", first_line(message)),
            TurnOutcome::Failed { message, .. } => format!("failed, {}", first_line(message)),
        };
        format!("\"{}\": {} -> {}", self.utterance.text(), self.intent, outcome)
    }

    /// What a follow-up request can build on
    ///
    /// A track request ("play So What") is described by its artist, a
    /// search ("search bossa nova") by its query.
    fn seed(&self) -> Option<Seed> {
        let genre = self
            .intent
            .param("genre")
            .map(str::to_string)
            .or_else(|| self.outcome.track().and_then(|t| t.genre.clone()))
            .or_else(|| self.intent.param("mood").map(str::to_string));
        if let Some(genre) = genre {
            return Some(Seed::Genre(genre));
        }

        let query = self.intent.param("query").map(|q| Seed::Query(q.to_string()));
        let artist = self
            .outcome
            .track()
            .and_then(|t| t.artists.first().cloned())
            .map(Seed::Artist);
        if self.intent.action == Action::Search {
            query.or(artist)
        } else {
            artist.or(query)
        }
    }
}

/// Value taken from history to resolve "more like this"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seed {
    /// Genre or mood; safe to pass on as the `genre` parameter
    Genre(String),
    Artist(String),
    /// Literal query of an earlier search
    Query(String),
}

impl Seed {
    pub fn value(&self) -> &str {
        match self {
            Seed::Genre(v) | Seed::Artist(v) | Seed::Query(v) => v.as_str(),
        }
    }

    pub fn genre(&self) -> Option<&str> {
        match self {
            Seed::Genre(v) => Some(v.as_str()),
            Seed::Artist(_) | Seed::Query(_) => None,
        }
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}

/// Bounded, append-only history of one session
#[derive(Debug)]
pub struct SessionContext {
    entries: VecDeque<ContextEntry>,
    capacity: usize,
}

impl SessionContext {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a turn, evicting the oldest when full
    pub fn record(&mut self, utterance: Utterance, intent: Intent, result: &ActionResult) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ContextEntry {
            utterance,
            intent,
            outcome: TurnOutcome::from_result(result),
        });
    }

    /// The last `k` entries, oldest first. Returns everything when `k` exceeds the length.
    pub fn recent(&self, k: usize) -> Vec<&ContextEntry> {
        let skip = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent successful turn that produced a track
    pub fn last_track(&self) -> Option<&Track> {
        self.entries
            .iter()
            .rev()
            .find_map(|entry| entry.outcome.track())
    }

    /// Seed of the most recent successful turn that has one
    pub fn last_seed(&self) -> Option<Seed> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| entry.outcome.is_success())
            .find_map(ContextEntry::seed)
    }

    /// Prompt block describing the last `k` turns
    pub fn summary(&self, k: usize) -> String {
        let recent = self.recent(k);
        if recent.is_empty() {
            return "(no previous commands)\n".to_string();
        }
        let mut s = String::new();
        for entry in recent {
            s.push_str(&format!("- {}\n", entry.summary()));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::{SessionId, UtteranceId};

    fn track(name: &str, genre: Option<&str>) -> Track {
        Track {
            id: name.to_lowercase(),
            uri: format!("spotify:track:{}", name.to_lowercase()),
            name: name.into(),
            artists: vec!["Artist".into()],
            album: "Album".into(),
            duration_ms: 180_000,
            genre: genre.map(str::to_string),
        }
    }

    fn ok(track: Option<Track>) -> ActionResult {
        ActionResult {
            utterance_id: UtteranceId::new(),
            success: true,
            message: "done".into(),
            error_kind: None,
            warning: None,
            track,
        }
    }

    fn failed(kind: ErrorKind) -> ActionResult {
        ActionResult {
            utterance_id: UtteranceId::new(),
            success: false,
            message: "nope".into(),
            error_kind: Some(kind),
            warning: None,
            track: None,
        }
    }

    #[test]
    fn test_empty_context() {
        let ctx = SessionContext::new(5);
        assert!(ctx.is_empty());
        assert!(ctx.recent(3).is_empty());
        assert!(ctx.last_seed().is_none());
        assert!(ctx.summary(3).contains("no previous commands"));
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let session = SessionId::new();
        let mut ctx = SessionContext::new(3);
        for i in 0..5 {
            ctx.record(
                Utterance::new(session, format!("cmd {}", i)),
                Intent::new(Action::Skip),
                &ok(None),
            );
        }
        assert_eq!(ctx.len(), 3);
        let texts: Vec<_> = ctx.recent(10).iter().map(|e| e.utterance.text()).collect();
        assert_eq!(texts, vec!["cmd 2", "cmd 3", "cmd 4"]);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut ctx = SessionContext::new(0);
        ctx.record(
            Utterance::new(SessionId::new(), "pause"),
            Intent::new(Action::Pause),
            &ok(None),
        );
        assert_eq!(ctx.capacity(), 1);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_last_seed_prefers_track_genre() {
        let session = SessionId::new();
        let mut ctx = SessionContext::new(5);
        ctx.record(
            Utterance::new(session, "play so what"),
            Intent::new(Action::Play).with_param("query", "so what"),
            &ok(Some(track("So What", Some("jazz")))),
        );
        assert_eq!(ctx.last_seed(), Some(Seed::Genre("jazz".into())));
    }

    #[test]
    fn test_last_seed_skips_failures() {
        let session = SessionId::new();
        let mut ctx = SessionContext::new(5);
        ctx.record(
            Utterance::new(session, "search bossa nova"),
            Intent::new(Action::Search).with_param("query", "bossa nova"),
            &ok(None),
        );
        ctx.record(
            Utterance::new(session, "play metal"),
            Intent::new(Action::Play).with_param("query", "metal"),
            &failed(ErrorKind::NoActiveDevice),
        );
        assert_eq!(ctx.last_seed(), Some(Seed::Query("bossa nova".into())));
    }

    #[test]
    fn test_track_request_seeds_artist_not_title() {
        let session = SessionId::new();
        let mut ctx = SessionContext::new(5);
        ctx.record(
            Utterance::new(session, "play so what"),
            Intent::new(Action::Play).with_param("query", "so what"),
            &ok(Some(track("So What", None))),
        );
        let seed = ctx.last_seed().unwrap();
        assert_eq!(seed, Seed::Artist("Artist".into()));
        assert_eq!(seed.genre(), None);
    }

    #[test]
    fn test_last_track() {
        let session = SessionId::new();
        let mut ctx = SessionContext::new(5);
        ctx.record(
            Utterance::new(session, "play a"),
            Intent::new(Action::Play).with_param("query", "a"),
            &ok(Some(track("A", None))),
        );
        ctx.record(
            Utterance::new(session, "pause"),
            Intent::new(Action::Pause),
            &ok(None),
        );
        assert_eq!(ctx.last_track().map(|t| t.name.as_str()), Some("A"));
    }

    #[test]
    fn test_summary_lines() {
        let session = SessionId::new();
        let mut ctx = SessionContext::new(5);
        ctx.record(
            Utterance::new(session, "play so what"),
            Intent::new(Action::Play).with_param("query", "so what"),
            &ok(Some(track("So What", Some("jazz")))),
        );
        ctx.record(
            Utterance::new(session, "skip"),
            Intent::new(Action::Skip),
            &failed(ErrorKind::NoActiveDevice),
        );
        let summary = ctx.summary(3);
        assert!(summary.contains("play query=\"so what\" -> ok, So What by Artist"));
        assert!(summary.contains("skip -> failed, nope"));
    }
}
