//! Track resolution - turns an intent's query and hints into one concrete track

use crate::core::error::{AmpError, Result};
use crate::core::types::Track;
use crate::llm::parser::Intent;
use crate::streaming::StreamingService;
use tracing::debug;

/// Result of resolving an intent to a track
#[derive(Debug, Clone)]
pub struct Resolution {
    pub track: Track,
    /// How many search results were considered
    pub candidates: usize,
    pub matched: MatchReason,
    /// Hints that could not be honored
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    /// First result, no hint given
    BestMatch,
    /// `pick=<n>`, 1-based
    Pick(usize),
    /// `artist=<name>`
    Artist(String),
}

/// Resolves an intent's `query` against the streaming service's search
pub struct TrackResolver<'a> {
    service: &'a dyn StreamingService,
    limit: u32,
}

impl<'a> TrackResolver<'a> {
    pub fn new(service: &'a dyn StreamingService, limit: u32) -> Self {
        Self {
            service,
            limit: limit.max(1),
        }
    }

    pub async fn resolve(&self, intent: &Intent) -> Result<Resolution> {
        let query = intent
            .param("query")
            .ok_or_else(|| AmpError::Validation("nothing to search for".into()))?;
        let results = self.service.search(query, self.limit).await?;
        debug!(query, results = results.len(), "search for resolution");
        if results.is_empty() {
            return Err(AmpError::Validation(format!("No tracks found for \"{}\"", query)));
        }

        let mut notes = Vec::new();
        let (index, matched) = if let Some(pick) = intent.param("pick") {
            let n = pick
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| AmpError::Validation(format!("pick must be a positive number, got \"{}\"", pick)))?;
            if n > results.len() {
                return Err(AmpError::Validation(format!(
                    "Only {} results for \"{}\", cannot pick #{}",
                    results.len(),
                    query,
                    n
                )));
            }
            (n - 1, MatchReason::Pick(n))
        } else if let Some(artist) = intent.param("artist") {
            match find_by_artist(&results, artist) {
                Some(i) => (i, MatchReason::Artist(artist.to_string())),
                None => {
                    notes.push(format!("No result by {}, playing the best match", artist));
                    (0, MatchReason::BestMatch)
                }
            }
        } else {
            (0, MatchReason::BestMatch)
        };

        let candidates = results.len();
        let mut track = results.into_iter().nth(index).ok_or_else(|| {
            AmpError::Validation(format!("No tracks found for \"{}\"", query))
        })?;
        if track.genre.is_none() {
            track.genre = intent.param("genre").map(str::to_string);
        }

        Ok(Resolution {
            track,
            candidates,
            matched,
            notes,
        })
    }
}

fn find_by_artist(results: &[Track], artist: &str) -> Option<usize> {
    let wanted = artist.to_lowercase();
    results.iter().position(|t| {
        t.artists
            .iter()
            .any(|a| a.to_lowercase().contains(&wanted))
    })
}
