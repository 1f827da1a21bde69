//! Command execution pipeline
//!
//! Utterance -> IntentExtractor -> Intent -> Dispatcher (TrackResolver) -> ActionResult

pub mod executor;
pub mod pipeline;
pub mod resolver;

pub use executor::{ActionResult, Dispatcher};
pub use pipeline::Assistant;
pub use resolver::{MatchReason, Resolution, TrackResolver};
