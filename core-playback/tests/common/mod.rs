//! Shared fakes for the playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{ClipId, ClipPlayer, ClipSource, ClipStatus, ClipStatusSink};
use core_library::error::{LibraryError, Result as LibraryResult};
use core_library::models::{Chapter, Reciter, Verse};
use core_library::reciters::audio_locator;
use core_library::source::ChapterSource;
use core_playback::{EngineConfig, PlaybackEngine};
use core_runtime::config::PlaybackPolicy;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

pub const AUDIO_BASE: &str = "https://audio.test/data";

// ============================================================================
// Player
// ============================================================================

#[derive(Default)]
struct PlayerState {
    urls: HashMap<ClipId, String>,
    live: HashSet<ClipId>,
    loads: Vec<String>,
    unloads: HashMap<ClipId, usize>,
    playing: HashSet<ClipId>,
    sinks: HashMap<ClipId, Arc<dyn ClipStatusSink>>,
    failing: HashSet<String>,
    gates: HashMap<String, Arc<Notify>>,
}

/// In-memory clip player that records every call.
#[derive(Default)]
pub struct FakePlayer {
    state: Mutex<PlayerState>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make loads of `url` wait until the returned gate is notified.
    pub fn hold(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state
            .lock()
            .gates
            .insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn fail(&self, url: &str) {
        self.state.lock().failing.insert(url.to_string());
    }

    pub fn load_count(&self, url: &str) -> usize {
        self.state.lock().loads.iter().filter(|u| *u == url).count()
    }

    pub fn total_loads(&self) -> usize {
        self.state.lock().loads.len()
    }

    /// Clips loaded and not yet unloaded.
    pub fn live_clips(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn live_urls(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut urls: Vec<_> = state.live.iter().map(|id| state.urls[id].clone()).collect();
        urls.sort();
        urls
    }

    /// Clips that were unloaded more than once.
    pub fn double_unloads(&self) -> usize {
        self.state.lock().unloads.values().filter(|n| **n > 1).count()
    }

    pub fn playing_urls(&self) -> Vec<String> {
        let state = self.state.lock();
        state
            .playing
            .iter()
            .map(|id| state.urls[id].clone())
            .collect()
    }

    pub fn is_playing(&self, url: &str) -> bool {
        self.playing_urls().iter().any(|u| u == url)
    }

    pub fn attached_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    fn live_clip(&self, url: &str) -> Option<ClipId> {
        let state = self.state.lock();
        state
            .live
            .iter()
            .copied()
            .find(|id| state.urls.get(id).is_some_and(|u| u == url))
    }

    /// Push a status update for the live clip at `url`, as the platform would.
    ///
    /// Returns false if no attached clip matches.
    pub fn push_status(&self, url: &str, status: ClipStatus) -> bool {
        let Some(clip) = self.live_clip(url) else {
            return false;
        };
        let sink = self.state.lock().sinks.get(&clip).cloned();
        match sink {
            Some(sink) => {
                sink.on_status(clip, status);
                true
            }
            None => false,
        }
    }

    /// Deliver a status for a clip regardless of attachment.
    pub fn push_status_via(&self, sink_url: &str, clip_url: &str, status: ClipStatus) -> bool {
        let (Some(sink_clip), Some(clip)) = (self.live_clip(sink_url), self.live_clip(clip_url))
        else {
            return false;
        };
        let sink = self.state.lock().sinks.get(&sink_clip).cloned();
        match sink {
            Some(sink) => {
                sink.on_status(clip, status);
                true
            }
            None => false,
        }
    }

    pub fn finish(&self, url: &str) -> bool {
        self.push_status(url, ClipStatus::finished(4_000))
    }
}

#[async_trait]
impl ClipPlayer for FakePlayer {
    async fn load(&self, source: ClipSource) -> BridgeResult<ClipId> {
        let gate = self.state.lock().gates.get(&source.url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        state.loads.push(source.url.clone());
        if state.failing.contains(&source.url) {
            return Err(BridgeError::OperationFailed(format!(
                "cannot open {}",
                source.url
            )));
        }
        let id = ClipId::new();
        state.urls.insert(id, source.url);
        state.live.insert(id);
        Ok(id)
    }

    async fn play(&self, clip: ClipId) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if !state.live.contains(&clip) {
            return Err(BridgeError::UnknownClip(clip.to_string()));
        }
        state.playing.insert(clip);
        Ok(())
    }

    async fn pause(&self, clip: ClipId) -> BridgeResult<()> {
        self.state.lock().playing.remove(&clip);
        Ok(())
    }

    async fn stop(&self, clip: ClipId) -> BridgeResult<()> {
        self.state.lock().playing.remove(&clip);
        Ok(())
    }

    async fn seek(&self, clip: ClipId, _position: Duration) -> BridgeResult<()> {
        if self.state.lock().live.contains(&clip) {
            Ok(())
        } else {
            Err(BridgeError::UnknownClip(clip.to_string()))
        }
    }

    async fn unload(&self, clip: ClipId) -> BridgeResult<()> {
        let mut state = self.state.lock();
        *state.unloads.entry(clip).or_insert(0) += 1;
        state.live.remove(&clip);
        state.playing.remove(&clip);
        state.sinks.remove(&clip);
        Ok(())
    }

    async fn attach_status(&self, clip: ClipId, sink: Arc<dyn ClipStatusSink>) -> BridgeResult<()> {
        self.state.lock().sinks.insert(clip, sink);
        Ok(())
    }

    async fn detach_status(&self, clip: ClipId) -> BridgeResult<()> {
        self.state.lock().sinks.remove(&clip);
        Ok(())
    }
}

// ============================================================================
// Content
// ============================================================================

/// Chapter source serving synthetic chapters.
#[derive(Default)]
pub struct FakeSource {
    chapters: Mutex<HashMap<u32, Chapter>>,
    failing: Mutex<HashSet<u32>>,
    gates: Mutex<HashMap<u32, Arc<Notify>>>,
    resolves: Mutex<Vec<u32>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_chapter(self: Arc<Self>, chapter: Chapter) -> Arc<Self> {
        self.chapters.lock().insert(chapter.id, chapter);
        self
    }

    pub fn fail(&self, chapter_id: u32) {
        self.failing.lock().insert(chapter_id);
    }

    pub fn hold(&self, chapter_id: u32) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(chapter_id, Arc::clone(&gate));
        gate
    }

    pub fn resolves(&self) -> Vec<u32> {
        self.resolves.lock().clone()
    }
}

#[async_trait]
impl ChapterSource for FakeSource {
    async fn resolve_chapter(&self, chapter_id: u32) -> LibraryResult<Chapter> {
        let gate = self.gates.lock().get(&chapter_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.resolves.lock().push(chapter_id);
        if self.failing.lock().contains(&chapter_id) {
            return Err(LibraryError::content_unavailable(chapter_id, "offline"));
        }
        self.chapters
            .lock()
            .get(&chapter_id)
            .cloned()
            .ok_or_else(|| LibraryError::content_unavailable(chapter_id, "unknown chapter"))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn chapter(id: u32, verse_count: u32) -> Chapter {
    Chapter {
        id,
        name_ar: format!("سورة {}", id),
        name_en: format!("Chapter {}", id),
        verses: (1..=verse_count)
            .map(|n| Verse {
                id: id * 1000 + n,
                number_in_chapter: n,
                text: format!("verse {} of {}", n, id),
                translation: None,
                audio_url: None,
            })
            .collect(),
    }
}

pub fn reciter() -> Reciter {
    Reciter::new("mishary", "Mishary Alafasy", "Alafasy_128kbps")
}

pub fn other_reciter() -> Reciter {
    Reciter::new("sudais", "Abdurrahmaan As-Sudais", "Sudais_192kbps")
}

pub fn url(chapter_id: u32, index: usize) -> String {
    audio_locator(AUDIO_BASE, &reciter().url_path, chapter_id, index)
}

pub fn url_for(reciter: &Reciter, chapter_id: u32, index: usize) -> String {
    audio_locator(AUDIO_BASE, &reciter.url_path, chapter_id, index)
}

pub struct Harness {
    pub engine: PlaybackEngine,
    pub player: Arc<FakePlayer>,
    pub source: Arc<FakeSource>,
    pub events: broadcast::Receiver<CoreEvent>,
}

pub fn policy() -> PlaybackPolicy {
    PlaybackPolicy {
        auto_advance_chapter: false,
        chapter_advance_delay: Duration::from_millis(20),
        preload_adjacent: true,
    }
}

pub fn harness(source: Arc<FakeSource>, policy: PlaybackPolicy) -> Harness {
    let player = FakePlayer::new();
    let bus = EventBus::new(256);
    let events = bus.subscribe();
    let config = EngineConfig::default()
        .with_audio_base_url(AUDIO_BASE)
        .with_policy(policy);

    let engine = PlaybackEngine::new(
        player.clone(),
        source.clone(),
        reciter(),
        config,
        bus,
    );

    Harness {
        engine,
        player,
        source,
        events,
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Async variant of [`wait_until`] for conditions that need to await.
pub async fn wait_until_async<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition().await
}

/// Drain the playback events published so far.
pub fn drain_playback(events: &mut broadcast::Receiver<CoreEvent>) -> Vec<PlaybackEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Playback(event) = event {
            out.push(event);
        }
    }
    out
}
