//! Scripted fakes of the model and the streaming service

#![allow(dead_code)]

use amp::command::{Assistant, Dispatcher};
use amp::core::error::{AmpError, Result};
use amp::core::types::Track;
use amp::llm::{IntentExtractor, LanguageModel};
use amp::streaming::{Device, NowPlaying, Playlist, StreamingService};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Answers prompts from a fixed script, in order
#[derive(Default)]
pub struct ScriptedModel {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AmpError::Extraction("script exhausted".into()))
    }
}

pub fn track(name: &str, artist: &str) -> Track {
    let id = name.to_lowercase().replace(' ', "-");
    Track {
        uri: format!("spotify:track:{}", id),
        id,
        name: name.into(),
        artists: vec![artist.into()],
        album: String::new(),
        duration_ms: 200_000,
        genre: None,
    }
}

/// In-memory account that records every call it receives
pub struct FakeStreaming {
    device: Mutex<bool>,
    results: Mutex<HashMap<String, Vec<Track>>>,
    catalog: Vec<Track>,
    now: Mutex<Option<NowPlaying>>,
    shuffle: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl FakeStreaming {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            device: Mutex::new(true),
            results: Mutex::new(HashMap::new()),
            catalog: vec![
                track("So What", "Miles Davis"),
                track("Blue in Green", "Miles Davis"),
                track("Naima", "John Coltrane"),
            ],
            now: Mutex::new(None),
            shuffle: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_device(&self, active: bool) {
        *self.device.lock().unwrap() = active;
    }

    /// Results for one exact query; other queries get the default catalog
    pub fn set_results(&self, query: &str, tracks: Vec<Track>) {
        self.results.lock().unwrap().insert(query.to_string(), tracks);
    }

    pub fn set_now_playing(&self, now: Option<NowPlaying>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl StreamingService for FakeStreaming {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Track>> {
        self.record(format!("search:{}", query));
        let tracks = self
            .results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.catalog.clone());
        Ok(tracks.into_iter().take(limit as usize).collect())
    }

    async fn active_device(&self) -> Result<Option<Device>> {
        self.record("devices");
        let active = *self.device.lock().unwrap();
        Ok(active.then(|| Device {
            id: Some("dev-1".into()),
            name: "Laptop".into(),
            is_active: true,
            volume_percent: Some(50),
        }))
    }

    async fn start_playback(&self, track_uri: Option<&str>) -> Result<()> {
        self.record(format!("play:{}", track_uri.unwrap_or("resume")));
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause");
        Ok(())
    }

    async fn skip_next(&self) -> Result<()> {
        self.record("next");
        Ok(())
    }

    async fn skip_previous(&self) -> Result<()> {
        self.record("previous");
        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        self.record(format!("volume:{}", percent));
        Ok(())
    }

    async fn enqueue(&self, track_uri: &str) -> Result<()> {
        self.record(format!("queue:{}", track_uri));
        Ok(())
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<Playlist> {
        self.record(format!("create-playlist:{}|{}", name, description));
        Ok(Playlist {
            id: "pl-1".into(),
            name: name.into(),
            url: Some("https://open.spotify.com/playlist/pl-1".into()),
        })
    }

    async fn add_to_playlist(&self, playlist_id: &str, track_uris: &[String]) -> Result<()> {
        self.record(format!("add:{}:{}", playlist_id, track_uris.join(",")));
        Ok(())
    }

    async fn like_current(&self) -> Result<Option<Track>> {
        self.record("like");
        Ok(self.now.lock().unwrap().as_ref().map(|n| n.track.clone()))
    }

    async fn toggle_shuffle(&self, state: Option<bool>) -> Result<bool> {
        let mut shuffle = self.shuffle.lock().unwrap();
        *shuffle = state.unwrap_or(!*shuffle);
        self.record(format!("shuffle:{}", *shuffle));
        Ok(*shuffle)
    }

    async fn currently_playing(&self) -> Result<Option<NowPlaying>> {
        self.record("now-playing");
        Ok(self.now.lock().unwrap().clone())
    }
}

pub fn dispatcher(service: &Arc<FakeStreaming>) -> Dispatcher {
    Dispatcher::new(service.clone(), 5, 20)
}

pub fn assistant(model: &Arc<ScriptedModel>, service: &Arc<FakeStreaming>) -> Assistant {
    let extractor = IntentExtractor::new(model.clone(), 3);
    Assistant::new(extractor, dispatcher(service), 20)
}
