pub mod config;
pub mod error;
pub mod types;

pub use config::AmpConfig;
pub use error::{AmpError, ErrorKind, Result};
pub use types::{SessionId, Track, Utterance, UtteranceId};
