//! Language model side of the pipeline: utterance in, intent out

pub mod client;
pub mod context;
pub mod extractor;
pub mod parser;

use crate::core::error::Result;
use async_trait::async_trait;

pub use client::LlmClient;
pub use context::{ContextEntry, Seed, SessionContext, TurnOutcome};
pub use extractor::IntentExtractor;
pub use parser::{parse_intent, Action, Intent};

/// Hosted completion endpoint: one prompt in, one text answer out
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
