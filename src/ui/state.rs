//! Status display state shared by front ends

use crate::command::ActionResult;
use crate::core::types::UtteranceId;
use std::collections::VecDeque;

/// Maximum result log entries to keep
const MAX_LOG_ENTRIES: usize = 50;

/// Tracks which utterance the display currently answers
///
/// Only the result for the most recently issued utterance is accepted;
/// anything else arrived late and is dropped.
#[derive(Debug, Default)]
pub struct StatusBoard {
    latest: Option<UtteranceId>,
    /// Accepted results, oldest first
    log: VecDeque<LogEntry>,
}

/// An entry in the result log
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub utterance: String,
    pub result: ActionResult,
    pub category: LogCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Success,
    Warning,
    Failure,
}

impl LogCategory {
    pub fn of(result: &ActionResult) -> Self {
        match (result.success, &result.warning) {
            (false, _) => LogCategory::Failure,
            (true, Some(_)) => LogCategory::Warning,
            (true, None) => LogCategory::Success,
        }
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            latest: None,
            log: VecDeque::with_capacity(MAX_LOG_ENTRIES),
        }
    }

    /// Mark `id` as the newest command; earlier results become stale
    pub fn issue(&mut self, id: UtteranceId) {
        self.latest = Some(id);
    }

    pub fn latest(&self) -> Option<UtteranceId> {
        self.latest
    }

    /// Keep `result` if it answers the latest issued utterance
    pub fn accept(&mut self, utterance: &str, result: ActionResult) -> bool {
        if self.latest != Some(result.utterance_id) {
            return false;
        }
        if self.log.len() >= MAX_LOG_ENTRIES {
            self.log.pop_front();
        }
        let category = LogCategory::of(&result);
        self.log.push_back(LogEntry {
            utterance: utterance.to_string(),
            result,
            category,
        });
        true
    }

    /// Latest accepted result
    pub fn current(&self) -> Option<&LogEntry> {
        self.log.back()
    }

    pub fn log(&self) -> impl Iterator<Item = &LogEntry> {
        self.log.iter()
    }
}
