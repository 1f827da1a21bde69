//! Spotify Web API payloads and the domain types built from them

use crate::core::types::{format_duration, Track};
use serde::Deserialize;

/// A playback device
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    pub is_active: bool,
    pub volume_percent: Option<u8>,
}

/// Current playback state
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: Track,
    pub is_playing: bool,
    pub progress_ms: u64,
    pub shuffle: bool,
}

impl NowPlaying {
    pub fn describe(&self) -> String {
        let status = if self.is_playing { "Playing" } else { "Paused" };
        format!(
            "{}: {} [{} / {}]",
            status,
            self.track,
            format_duration(self.progress_ms),
            format_duration(self.track.duration_ms)
        )
    }
}

/// A playlist created on the user's account
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub tracks: Paging<TrackObject>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Paging<T> {
    #[serde(default)]
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackObject {
    #[serde(default)]
    pub id: Option<String>,
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    #[serde(default)]
    pub album: Option<AlbumObject>,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArtistObject {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlbumObject {
    pub name: String,
}

impl From<TrackObject> for Track {
    fn from(t: TrackObject) -> Self {
        Track {
            id: t
                .id
                .unwrap_or_else(|| t.uri.rsplit(':').next().unwrap_or_default().to_string()),
            uri: t.uri,
            name: t.name,
            artists: t.artists.into_iter().map(|a| a.name).collect(),
            album: t.album.map(|a| a.name).unwrap_or_default(),
            duration_ms: t.duration_ms,
            genre: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<DeviceObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceObject {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    pub volume_percent: Option<u8>,
}

impl From<DeviceObject> for Device {
    fn from(d: DeviceObject) -> Self {
        Device {
            id: d.id,
            name: d.name,
            is_active: d.is_active,
            volume_percent: d.volume_percent,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaybackState {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub shuffle_state: bool,
    /// Absent for ads and podcast episodes without track metadata
    #[serde(default)]
    pub item: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserProfile {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub external_urls: Option<ExternalUrls>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExternalUrls {
    pub spotify: Option<String>,
}

impl From<PlaylistObject> for Playlist {
    fn from(p: PlaylistObject) -> Self {
        Playlist {
            id: p.id,
            name: p.name,
            url: p.external_urls.and_then(|u| u.spotify),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: Option<String>,
}
