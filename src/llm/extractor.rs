//! Turn one utterance plus session history into an intent
//!
//! The model only translates words into a grammar line. Everything that
//! follows (filling vague requests, binding "this" to history) is done
//! locally and deterministically.

use crate::core::error::{AmpError, Result};
use crate::core::types::Utterance;
use crate::llm::context::SessionContext;
use crate::llm::parser::{parse_intent, Action, Intent, GRAMMAR_PROMPT};
use crate::llm::LanguageModel;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Moods understood when generating a parameter for vague requests
pub const KNOWN_MOODS: &[&str] = &[
    "happy",
    "sad",
    "chill",
    "energetic",
    "focus",
    "party",
    "workout",
    "sleep",
    "romantic",
    "angry",
    "melancholic",
];

pub const DEFAULT_MOOD: &str = "chill";

const RELATIVE_PHRASES: &[&str] = &[
    "more like this",
    "more of this",
    "like this",
    "like that",
    "similar",
    "same vibe",
];

pub struct IntentExtractor {
    model: Arc<dyn LanguageModel>,
    context_turns: usize,
}

impl IntentExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, context_turns: usize) -> Self {
        Self {
            model,
            context_turns,
        }
    }

    /// Extract an intent, allowing one repair prompt when the answer does not parse
    pub async fn extract(&self, utterance: &Utterance, context: &SessionContext) -> Result<Intent> {
        let text = utterance.text().trim();
        if text.is_empty() {
            return Err(AmpError::EmptyInput);
        }

        let prompt = build_prompt(text, context, self.context_turns);
        let answer = self.model.complete(&prompt).await?;

        let intent = match parse_intent(&answer) {
            Ok(intent) => intent,
            Err(first) => {
                warn!(error = %first, "model answer did not parse, sending repair prompt");
                let repair = build_repair_prompt(&prompt, &answer);
                let answer = self.model.complete(&repair).await?;
                parse_intent(&answer)?
            }
        };
        debug!(%intent, "parsed model answer");

        let resolved = resolve(intent, text, context);
        info!(utterance = %utterance.id(), intent = %resolved, "extracted intent");
        Ok(resolved)
    }
}

/// Prompt with grammar, recent turns and the raw utterance in one message
pub fn build_prompt(text: &str, context: &SessionContext, turns: usize) -> String {
    format!(
        "{}\nRECENT TURNS (oldest first):\n{}\nUSER SAID:\n{}\n\nAnswer with one line:",
        GRAMMAR_PROMPT,
        context.summary(turns),
        text
    )
}

fn build_repair_prompt(prompt: &str, bad_answer: &str) -> String {
    format!(
        "{}\n\nYour previous answer was:\n{}\n\nThat is not valid. Respond only in the required format: \
         one line, an action from ACTIONS followed by key=\"value\" pairs.",
        prompt, bad_answer
    )
}

/// Whether the utterance refers back to something already played
///
/// Phrases match on whole words only.
pub fn is_relative(text: &str) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let padded = format!(" {} ", words.join(" "));
    RELATIVE_PHRASES
        .iter()
        .any(|p| padded.contains(&format!(" {} ", p)))
}

/// Mood named in the utterance, if any
pub fn mood_in(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .find_map(|word| KNOWN_MOODS.iter().copied().find(|m| *m == word))
}

/// Apply history and defaults to a freshly parsed intent
pub fn resolve(mut intent: Intent, text: &str, context: &SessionContext) -> Intent {
    let action = intent.action;

    if action.is_parameterless() {
        let reason = intent.param("reason").map(str::to_string);
        intent.parameters.clear();
        if let Some(reason) = reason.filter(|_| !context.is_empty()) {
            intent.parameters.insert("reason".into(), reason);
        }
        return intent;
    }

    let wants_tracks = matches!(
        action,
        Action::Search | Action::Play | Action::Queue | Action::CreatePlaylist
    );

    if wants_tracks && is_relative(text) {
        let query_is_relative = intent.param("query").map_or(true, is_relative);
        match context.last_seed() {
            Some(seed) => {
                debug!(seed = seed.value(), "resolving relative request from history");
                let missing_genre = intent.param("genre").is_none();
                if let (true, Some(genre)) = (missing_genre, seed.genre()) {
                    intent.parameters.insert("genre".into(), genre.to_string());
                }
                if action == Action::CreatePlaylist {
                    if intent.param("seeds").is_none() {
                        intent.parameters.insert("seeds".into(), seed.value().to_string());
                    }
                } else if query_is_relative {
                    intent.parameters.insert("query".into(), seed.value().to_string());
                }
            }
            None if action != Action::CreatePlaylist && query_is_relative => {
                debug!("relative request with empty history, searching literal text");
                let mut fresh = Intent::new(Action::Search).with_param("query", text);
                fresh.confidence = intent.confidence;
                return fresh;
            }
            None => {}
        }
    }

    if matches!(action, Action::Search | Action::Queue) && intent.param("query").is_none() {
        let generated = intent
            .param("genre")
            .or_else(|| intent.param("mood"))
            .map(str::to_string)
            .or_else(|| mood_in(text).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MOOD.to_string());
        if intent.param("mood").is_none() && intent.param("genre").is_none() {
            intent.parameters.insert("mood".into(), generated.clone());
        }
        intent.parameters.insert("query".into(), generated);
    }

    if action == Action::Play && intent.param("query").is_none() {
        let seed = intent
            .param("genre")
            .or_else(|| intent.param("mood"))
            .map(str::to_string);
        if let Some(seed) = seed {
            intent.parameters.insert("query".into(), seed);
        }
    }

    intent
}
