//! AMP - natural language music assistant
//!
//! Free text goes through a language model into a closed set of intents,
//! which are dispatched against the user's Spotify account.

pub mod command;
pub mod core;
pub mod llm;
pub mod streaming;
pub mod ui;
