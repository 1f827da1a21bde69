//! Streaming service access
//!
//! [`StreamingService`] is the seam the dispatcher talks to. [`SpotifyClient`]
//! implements it over the Spotify Web API with OAuth handled by
//! [`SpotifyAuth`].

pub mod auth;
pub mod client;
pub mod models;
#[cfg(test)]
mod test_server;

use crate::core::error::Result;
use crate::core::types::Track;
use async_trait::async_trait;

pub use auth::{SpotifyAuth, Token, TokenCache};
pub use client::SpotifyClient;
pub use models::{Device, NowPlaying, Playlist};

/// Authenticated operations against the user's streaming account
///
/// Every call fails with `Upstream` on non-2xx responses, `Auth` when
/// credentials are missing or cannot be refreshed, and `NoActiveDevice`
/// when a playback call has no target.
#[async_trait]
pub trait StreamingService: Send + Sync {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Track>>;

    /// The device currently receiving playback commands, if any
    async fn active_device(&self) -> Result<Option<Device>>;

    /// Play `track_uri`, or resume the current context when `None`
    async fn start_playback(&self, track_uri: Option<&str>) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn skip_next(&self) -> Result<()>;

    async fn skip_previous(&self) -> Result<()>;

    async fn set_volume(&self, percent: u8) -> Result<()>;

    async fn enqueue(&self, track_uri: &str) -> Result<()>;

    async fn create_playlist(&self, name: &str, description: &str) -> Result<Playlist>;

    async fn add_to_playlist(&self, playlist_id: &str, track_uris: &[String]) -> Result<()>;

    /// Save the current track to the library. `None` when nothing is playing.
    async fn like_current(&self) -> Result<Option<Track>>;

    /// Set shuffle, or invert it when `state` is `None`. Returns the new state.
    async fn toggle_shuffle(&self, state: Option<bool>) -> Result<bool>;

    async fn currently_playing(&self) -> Result<Option<NowPlaying>>;
}
