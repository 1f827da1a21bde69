//! Parse model answers into structured intents
//!
//! The model is asked to answer with a single line:
//!
//! ```text
//! action[ key=value ...]      e.g.  create-playlist name="Rainy Day" mood=chill
//! action[ free text]          e.g.  search lofi hip hop
//! ```
//!
//! Free text is bound to the action's primary parameter. Anything that does
//! not match this grammar is rejected; there is no fuzzy fallback.

use crate::core::error::{AmpError, Result};
use nom::{
    branch::alt,
    bytes::complete::{take_till, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, rest},
    multi::separated_list1,
    sequence::{delimited, preceded, separated_pair, terminated},
    IResult, Parser,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The closed set of supported operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Search,
    Play,
    Pause,
    Skip,
    Previous,
    SetVolume,
    Queue,
    CreatePlaylist,
    Like,
    ShuffleToggle,
    NowPlaying,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::Search,
        Action::Play,
        Action::Pause,
        Action::Skip,
        Action::Previous,
        Action::SetVolume,
        Action::Queue,
        Action::CreatePlaylist,
        Action::Like,
        Action::ShuffleToggle,
        Action::NowPlaying,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Play => "play",
            Action::Pause => "pause",
            Action::Skip => "skip",
            Action::Previous => "previous",
            Action::SetVolume => "set-volume",
            Action::Queue => "queue",
            Action::CreatePlaylist => "create-playlist",
            Action::Like => "like",
            Action::ShuffleToggle => "shuffle-toggle",
            Action::NowPlaying => "now-playing",
        }
    }

    /// Parameter that free text after the action name is bound to
    pub fn primary_param(self) -> &'static str {
        match self {
            Action::Search | Action::Play | Action::Queue => "query",
            Action::SetVolume => "level",
            Action::CreatePlaylist => "name",
            Action::ShuffleToggle => "state",
            Action::Pause | Action::Skip | Action::Previous | Action::Like | Action::NowPlaying => {
                "reason"
            }
        }
    }

    /// Actions that need an active playback device
    pub fn needs_device(self) -> bool {
        matches!(
            self,
            Action::Play
                | Action::Pause
                | Action::Skip
                | Action::Previous
                | Action::SetVolume
                | Action::Queue
                | Action::ShuffleToggle
        )
    }

    /// Actions that take no parameters of their own
    pub fn is_parameterless(self) -> bool {
        matches!(
            self,
            Action::Pause | Action::Skip | Action::Previous | Action::Like | Action::NowPlaying
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = AmpError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let action = match normalized.as_str() {
            "search" | "find" => Action::Search,
            "play" | "resume" => Action::Play,
            "pause" | "stop" => Action::Pause,
            "skip" | "next" => Action::Skip,
            "previous" | "prev" | "back" => Action::Previous,
            "set-volume" | "volume" => Action::SetVolume,
            "queue" | "enqueue" => Action::Queue,
            "create-playlist" | "playlist" => Action::CreatePlaylist,
            "like" | "save" => Action::Like,
            "shuffle-toggle" | "shuffle" => Action::ShuffleToggle,
            "now-playing" | "now" | "current" => Action::NowPlaying,
            _ => return Err(AmpError::UnsupportedAction(s.trim().to_string())),
        };
        Ok(action)
    }
}

/// Structured representation of what the user asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: Action,
    pub parameters: BTreeMap<String, String>,
    pub confidence: Option<f32>,
}

impl Intent {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            parameters: BTreeMap::new(),
            confidence: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Non-blank parameter value
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action)?;
        for (key, value) in &self.parameters {
            write!(f, " {}=\"{}\"", key, value)?;
        }
        Ok(())
    }
}

enum Args<'a> {
    Pairs(Vec<(&'a str, &'a str)>),
    Free(&'a str),
    Empty,
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_').parse(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_till(|c: char| c == '"'), char('"')).parse(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '"').parse(input)
}

fn pair(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(word, char('='), alt((quoted, bare))).parse(input)
}

fn pairs(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    all_consuming(terminated(separated_list1(multispace1, pair), multispace0)).parse(input)
}

fn line(input: &str) -> IResult<&str, (&str, Args<'_>)> {
    let (input, name) = preceded(multispace0, word).parse(input)?;
    let (input, args) = alt((
        map(preceded(multispace1, pairs), Args::Pairs),
        map(all_consuming(multispace0), |_| Args::Empty),
        map(preceded(multispace1, rest), Args::Free),
    ))
    .parse(input)?;
    Ok((input, (name, args)))
}

/// First non-empty line of a model response, without code fences or quotes
fn answer_line(response: &str) -> Option<&str> {
    response
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with("```"))
        .map(|l| l.trim_matches('`').trim_matches('\'').trim())
        .map(|l| {
            if l.len() >= 2 && l.starts_with('"') && l.ends_with('"') && l.matches('"').count() == 2
            {
                &l[1..l.len() - 1]
            } else {
                l
            }
        })
        .find(|l| !l.is_empty())
}

/// Parse a model response into an intent
///
/// Fails with `Extraction` when the text does not follow the grammar and
/// with `UnsupportedAction` when it does but names an action outside the
/// closed set.
pub fn parse_intent(response: &str) -> Result<Intent> {
    let text = answer_line(response)
        .ok_or_else(|| AmpError::Extraction("model returned an empty answer".into()))?;

    let (_, (name, args)) = line(text).map_err(|_| {
        AmpError::Extraction(format!("answer does not follow the command format: {}", text))
    })?;

    let action: Action = name.parse()?;
    let mut intent = Intent::new(action);

    match args {
        Args::Pairs(pairs) => {
            for (key, value) in pairs {
                let key = key.to_ascii_lowercase().replace('-', "_");
                if key == "confidence" {
                    intent.confidence = value.parse::<f32>().ok().map(|c| c.clamp(0.0, 1.0));
                    continue;
                }
                intent.parameters.insert(key, value.trim().to_string());
            }
        }
        Args::Free(text) => {
            let text = text.trim().trim_matches('"').trim();
            if !text.is_empty() {
                intent
                    .parameters
                    .insert(action.primary_param().to_string(), text.to_string());
            }
        }
        Args::Empty => {}
    }

    Ok(intent)
}

/// Instruction block sent ahead of context and the user's words
pub const GRAMMAR_PROMPT: &str = r#"You translate music-player commands into ONE line of the form:
action key="value" key="value"

ACTIONS:
- search: find tracks (query, optional mood, genre)
- play: play a track or resume when no query (query, optional artist, pick)
- pause: pause playback
- skip: next track (optional reason)
- previous: previous track
- set-volume: set volume (level 0-100)
- queue: add a track to the queue (query)
- create-playlist: new playlist (name, optional seeds, mood, genre, count)
- like: save the current track
- shuffle-toggle: shuffle on or off (optional state=on|off)
- now-playing: what is playing

RULES:
- Answer with the single line only. No explanation, no JSON.
- Vague requests like "play something" become search with a mood, never an empty query.
- If the user refers to "this" or "more like this", use the genre or artist from RECENT TURNS.
- Optionally add confidence=0.0-1.0.

EXAMPLES:
"play lofi hip hop" -> play query="lofi hip hop"
"find some lofi hip hop" -> search query="lofi hip hop"
"play something" -> search mood="chill" query="chill"
"put on Blue in Green by Miles Davis" -> play query="Blue in Green" artist="Miles Davis"
"stop the music" -> pause
"skip, too slow" -> skip reason="too slow"
"go back" -> previous
"turn it up to 70" -> set-volume level="70"
"add Clair de Lune to the queue" -> queue query="Clair de Lune"
"make me a rainy day playlist" -> create-playlist name="Rainy Day" mood="chill"
"I love this song" -> like
"shuffle off" -> shuffle-toggle state="off"
"what's playing?" -> now-playing
"#;
