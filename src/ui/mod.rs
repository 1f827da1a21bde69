//! Front ends: where utterances come from and results go to
//!
//! The pipeline only ever hands a front end an [`ActionResult`]; front ends
//! never see extractor or dispatcher internals.

pub mod state;
pub mod terminal;

use crate::command::ActionResult;
use crate::core::types::UtteranceId;
use std::io;

pub use state::{LogCategory, LogEntry, StatusBoard};
pub use terminal::TerminalFrontEnd;

/// Words after which a front end shows what is now playing
const PLAYBACK_WORDS: &[&str] = &["play", "skip", "next", "back", "prev", "previous", "resume"];

/// Whether a successful command likely changed the current track
pub fn changes_track(text: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| PLAYBACK_WORDS.contains(&w))
}

/// Utterance in, result out
pub trait FrontEnd {
    /// Next line of user input, `None` at end of input
    fn read_utterance(&mut self) -> io::Result<Option<String>>;

    /// Record `id` as the command whose result should be shown next
    fn issue(&mut self, id: UtteranceId);

    /// Show a result, dropping it if a newer command has been issued
    fn render(&mut self, result: &ActionResult) -> io::Result<()>;

    /// Informational text outside the command flow
    fn announce(&mut self, message: &str) -> io::Result<()>;
}
