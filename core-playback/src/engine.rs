//! # Playback Engine
//!
//! Plays the verses of one chapter back to back, keeping the neighbouring
//! verses preloaded so skips and natural advances start without a fetch.
//!
//! ## Session state
//!
//! All mutable state lives in one [`Session`] behind a synchronous lock that
//! is never held across an `.await`. Every operation that replaces the active
//! clip or index takes a new ticket from the session first. Work that
//! finishes under an older ticket is discarded and its clip released, so a
//! slow fetch can never overwrite newer state.
//!
//! ## Busy guard
//!
//! `busy` records the ticket of the verse load in flight. Skips and
//! completion-driven advances are dropped while the current ticket owns it.
//! Explicit targets (`play_chapter`, `play_verse_at`, `change_reciter`) take a
//! new ticket and with it the guard.
//!
//! ## Status delivery
//!
//! The platform pushes [`ClipStatus`] updates into an unbounded channel; a
//! driver task applies them in order. Updates from anything but the active
//! clip are ignored.

use crate::clip::ClipHandle;
use crate::config::EngineConfig;
use crate::error::{PlaybackError, Result};
use crate::slots::{PreloadSlots, SlotSide};
use bridge_traits::playback::{ClipId, ClipPlayer, ClipStatus, ClipStatusSink};
use core_library::models::{Chapter, Reciter, LAST_CHAPTER_ID};
use core_library::reciters::audio_locator;
use core_library::source::ChapterSource;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::strip_path;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Direction for [`PlaybackEngine::skip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDirection {
    Next,
    Previous,
}

/// Coarse engine state, derived from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No chapter loaded
    Idle,
    /// Chapter or verse clip acquisition in flight
    Loading,
    Playing,
    Paused,
    /// The last verse of the chapter finished
    Stopped,
}

/// Published state of the engine at one instant.
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub phase: PlaybackPhase,
    pub chapter: Option<Arc<Chapter>>,
    /// Zero-based index of the active verse, when a chapter is loaded
    pub index: Option<usize>,
    pub active_verse_id: Option<u32>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub reciter: Reciter,
}

struct Session {
    chapter: Option<Arc<Chapter>>,
    index: usize,
    active: Option<Arc<ClipHandle>>,
    slots: PreloadSlots,
    reciter: Reciter,
    is_playing: bool,
    is_loading: bool,
    /// Set when the last verse finished; the next resume starts from 0
    finished: bool,
    position_ms: u64,
    duration_ms: u64,
    ticket: u64,
    busy: Option<u64>,
    /// Changes whenever loaded clips stop matching the chapter or reciter
    generation: u64,
    /// Delayed move to the next chapter, cancelled by any user action
    pending_advance: Option<CancellationToken>,
}

impl Session {
    fn new(reciter: Reciter) -> Self {
        Self {
            chapter: None,
            index: 0,
            active: None,
            slots: PreloadSlots::default(),
            reciter,
            is_playing: false,
            is_loading: false,
            finished: false,
            position_ms: 0,
            duration_ms: 0,
            ticket: 0,
            busy: None,
            generation: 0,
            pending_advance: None,
        }
    }

    fn bump(&mut self) -> u64 {
        self.cancel_advance();
        self.ticket += 1;
        self.ticket
    }

    fn cancel_advance(&mut self) {
        if let Some(advance) = self.pending_advance.take() {
            advance.cancel();
        }
    }

    fn check(&self, ticket: u64) -> Result<()> {
        if ticket == self.ticket {
            Ok(())
        } else {
            Err(PlaybackError::StaleOperation {
                ticket,
                current: self.ticket,
            })
        }
    }

    fn is_busy(&self) -> bool {
        self.busy == Some(self.ticket)
    }

    fn release_busy(&mut self, ticket: u64) {
        if self.busy == Some(ticket) {
            self.busy = None;
        }
    }

    fn is_active(&self, handle: &Arc<ClipHandle>) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, handle))
    }

    /// Detach every handle from the session.
    ///
    /// Preloads still in flight belong to the old generation and are
    /// released when they land.
    fn take_all(&mut self) -> Vec<Arc<ClipHandle>> {
        self.generation += 1;
        let mut handles: Vec<_> = self.active.take().into_iter().collect();
        handles.extend(self.slots.drain());
        handles
    }

    fn phase(&self) -> PlaybackPhase {
        if self.is_loading {
            PlaybackPhase::Loading
        } else if self.chapter.is_none() {
            PlaybackPhase::Idle
        } else if self.is_playing {
            PlaybackPhase::Playing
        } else if self.finished {
            PlaybackPhase::Stopped
        } else {
            PlaybackPhase::Paused
        }
    }
}

/// Forwards platform status callbacks into the engine's driver task.
struct StatusForwarder {
    tx: mpsc::UnboundedSender<(ClipId, ClipStatus)>,
}

impl ClipStatusSink for StatusForwarder {
    fn on_status(&self, clip: ClipId, status: ClipStatus) {
        // The driver only stops when the engine is gone
        let _ = self.tx.send((clip, status));
    }
}

struct Inner {
    player: Arc<dyn ClipPlayer>,
    source: Arc<dyn ChapterSource>,
    config: EngineConfig,
    events: EventBus,
    sink: Arc<dyn ClipStatusSink>,
    session: Mutex<Session>,
    driver: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.driver.cancel();
    }
}

struct SwitchPlan {
    chapter: Arc<Chapter>,
    discarded: Vec<Arc<ClipHandle>>,
    reused: Option<Arc<ClipHandle>>,
    url: String,
}

enum VerseRequest {
    Restart {
        handle: Arc<ClipHandle>,
        was_playing: bool,
        chapter_id: u32,
        index: usize,
    },
    Switch {
        ticket: u64,
        discarded: Vec<Arc<ClipHandle>>,
        new_chapter: bool,
    },
}

enum AfterFinish {
    Advance { ticket: u64, next: usize },
    ChapterEnd { chapter_id: u32, ticket: u64 },
}

/// Sequencing engine for verse-by-verse recitation.
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<Inner>,
}

impl PlaybackEngine {
    /// Create an idle engine.
    ///
    /// Must be called from within a Tokio runtime: the status driver is
    /// spawned here.
    pub fn new(
        player: Arc<dyn ClipPlayer>,
        source: Arc<dyn ChapterSource>,
        reciter: Reciter,
        config: EngineConfig,
        events: EventBus,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = CancellationToken::new();

        let inner = Arc::new(Inner {
            player,
            source,
            config,
            events,
            sink: Arc::new(StatusForwarder { tx }),
            session: Mutex::new(Session::new(reciter)),
            driver: driver.clone(),
        });

        tokio::spawn(Self::drive_status(Arc::downgrade(&inner), rx, driver));
        Self { inner }
    }

    async fn drive_status(
        engine: Weak<Inner>,
        mut rx: mpsc::UnboundedReceiver<(ClipId, ClipStatus)>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                update = rx.recv() => {
                    let Some((clip, status)) = update else { break };
                    let Some(inner) = engine.upgrade() else { break };
                    PlaybackEngine { inner }.handle_clip_status(clip, status).await;
                }
            }
        }
        debug!("Clip status driver stopped");
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Resolve a chapter and start at `start_index`.
    ///
    /// Supersedes anything in flight. With `auto_play` false the verse clip
    /// is loaded but transport is not started.
    ///
    /// # Errors
    /// - `ContentUnavailable` if the chapter cannot be resolved; the engine
    ///   returns to idle
    /// - `ResourceUnavailable` if the first clip cannot be loaded
    #[instrument(skip(self))]
    pub async fn play_chapter(
        &self,
        chapter_id: u32,
        start_index: usize,
        auto_play: bool,
    ) -> Result<()> {
        let result = self.load_chapter(chapter_id, start_index, auto_play).await;
        self.settle(result)
    }

    /// Play verse `index` of an already resolved chapter.
    ///
    /// Re-requesting the active verse restarts it from 0 without reloading.
    /// A different chapter replaces the session.
    #[instrument(skip(self, chapter), fields(chapter_id = chapter.id))]
    pub async fn play_verse_at(&self, chapter: Arc<Chapter>, index: usize) -> Result<()> {
        let result = self.request_verse(chapter, index).await;
        self.settle(result)
    }

    /// Move to the neighbouring verse. Dropped while a verse load is in flight.
    #[instrument(skip(self))]
    pub async fn skip(&self, direction: SkipDirection) -> Result<()> {
        let result = self.request_skip(direction).await;
        self.settle(result)
    }

    /// Pause if playing, otherwise play. No-op without an active clip.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let result = self.toggle().await;
        self.settle(result)
    }

    /// Seek the active clip, clamped to its duration. No-op without one.
    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        let result = self.seek_active(position_ms).await;
        self.settle(result)
    }

    /// Swap the reciter, reloading the active verse under it.
    ///
    /// The active index is kept. If the session was playing it keeps playing;
    /// otherwise the new clip is loaded but left paused.
    #[instrument(skip(self, reciter), fields(reciter = %reciter.id))]
    pub async fn change_reciter(&self, reciter: Reciter) -> Result<()> {
        let result = self.swap_reciter(reciter).await;
        self.settle(result)
    }

    /// Release every clip and return to idle.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let discarded = {
            let mut session = self.inner.session.lock();
            session.bump();
            session.busy = None;
            session.chapter = None;
            session.index = 0;
            session.is_playing = false;
            session.is_loading = false;
            session.finished = false;
            session.position_ms = 0;
            session.duration_ms = 0;
            session.take_all()
        };

        let released = self.release_all(discarded).await;
        info!(released, "Playback engine shut down");
    }

    /// Apply one status update from the platform media clock.
    pub async fn handle_clip_status(&self, clip: ClipId, status: ClipStatus) {
        let active = {
            let session = self.inner.session.lock();
            session
                .active
                .clone()
                .filter(|handle| handle.clip_id() == Some(clip))
        };
        let Some(active) = active else {
            debug!(clip_id = %clip, "Ignoring status from inactive clip");
            return;
        };

        active.record_status(&status).await;

        let progress = {
            let mut session = self.inner.session.lock();
            if !session.is_active(&active) || !status.is_loaded {
                None
            } else {
                session.position_ms = status.position_ms;
                if status.duration_ms > 0 {
                    session.duration_ms = status.duration_ms;
                }
                if !status.did_just_finish {
                    session.is_playing = status.is_playing;
                }
                Some((session.position_ms, session.duration_ms))
            }
        };

        let Some((position_ms, duration_ms)) = progress else {
            return;
        };
        self.emit(PlaybackEvent::PositionChanged {
            position_ms,
            duration_ms,
        });

        if status.did_just_finish {
            // The advance may wait on a slow fetch; keep the driver free
            let engine = self.clone();
            tokio::spawn(async move {
                let result = engine.on_clip_finished(active).await;
                // Failures are already published as events
                let _ = engine.settle(result);
            });
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let session = self.inner.session.lock();
        let index = session.chapter.as_ref().map(|_| session.index);
        let active_verse_id = session
            .chapter
            .as_ref()
            .and_then(|chapter| chapter.verse(session.index))
            .map(|verse| verse.id);

        PlaybackSnapshot {
            phase: session.phase(),
            chapter: session.chapter.clone(),
            index,
            active_verse_id,
            is_playing: session.is_playing,
            is_loading: session.is_loading,
            position_ms: session.position_ms,
            duration_ms: session.duration_ms,
            reciter: session.reciter.clone(),
        }
    }

    pub fn reciter(&self) -> Reciter {
        self.inner.session.lock().reciter.clone()
    }

    /// Verse indices currently held in the preload slots.
    pub fn preloaded_indices(&self) -> Vec<usize> {
        self.inner.session.lock().slots.held_indices()
    }

    /// Current operation ticket.
    pub fn ticket(&self) -> u64 {
        self.inner.session.lock().ticket
    }

    pub fn policy(&self) -> core_runtime::config::PlaybackPolicy {
        self.inner.config.policy
    }

    // =========================================================================
    // Operation bodies
    // =========================================================================

    async fn load_chapter(&self, chapter_id: u32, start_index: usize, auto_play: bool) -> Result<()> {
        let (ticket, discarded) = {
            let mut session = self.inner.session.lock();
            let ticket = session.bump();
            session.busy = Some(ticket);
            session.is_loading = true;
            session.is_playing = false;
            session.finished = false;
            session.position_ms = 0;
            session.duration_ms = 0;
            (ticket, session.take_all())
        };

        self.release_all(discarded).await;
        info!(chapter_id, start_index, ticket, "Loading chapter");

        let resolved = self.inner.source.resolve_chapter(chapter_id).await;

        let chapter = {
            let mut session = self.inner.session.lock();
            session.check(ticket)?;

            match resolved {
                Ok(chapter) => {
                    let chapter = Arc::new(chapter);
                    session.chapter = Some(Arc::clone(&chapter));
                    session.index = 0;
                    chapter
                }
                Err(e) => {
                    session.chapter = None;
                    session.index = 0;
                    session.is_loading = false;
                    session.release_busy(ticket);
                    return Err(PlaybackError::content_unavailable(chapter_id, e));
                }
            }
        };

        self.emit(PlaybackEvent::ChapterLoaded {
            chapter_id: chapter.id,
            verse_count: chapter.len() as u32,
        });

        self.activate(ticket, start_index, auto_play).await
    }

    async fn request_verse(&self, chapter: Arc<Chapter>, index: usize) -> Result<()> {
        if !chapter.contains_index(index) {
            return Err(PlaybackError::InvalidIndex {
                index,
                len: chapter.len(),
            });
        }

        let request = {
            let mut session = self.inner.session.lock();
            let same_chapter = session
                .chapter
                .as_ref()
                .is_some_and(|current| current.id == chapter.id);

            match session.active.clone() {
                Some(handle) if same_chapter && session.index == index => {
                    session.cancel_advance();
                    VerseRequest::Restart {
                        handle,
                        was_playing: session.is_playing,
                        chapter_id: chapter.id,
                        index,
                    }
                }
                _ => {
                    let ticket = session.bump();
                    session.busy = Some(ticket);
                    let discarded = if same_chapter {
                        Vec::new()
                    } else {
                        let discarded = session.take_all();
                        session.chapter = Some(Arc::clone(&chapter));
                        session.index = 0;
                        discarded
                    };
                    VerseRequest::Switch {
                        ticket,
                        discarded,
                        new_chapter: !same_chapter,
                    }
                }
            }
        };

        match request {
            VerseRequest::Restart {
                handle,
                was_playing,
                chapter_id,
                index,
            } => {
                debug!(index, was_playing, "Restarting active verse");
                handle.seek(0).await?;
                if !was_playing {
                    handle.play().await?;
                }
                {
                    let mut session = self.inner.session.lock();
                    if session.is_active(&handle) {
                        session.position_ms = 0;
                        session.is_playing = true;
                        session.finished = false;
                    }
                }
                self.emit(PlaybackEvent::Started {
                    chapter_id,
                    index: index as u32,
                });
                Ok(())
            }
            VerseRequest::Switch {
                ticket,
                discarded,
                new_chapter,
            } => {
                self.release_all(discarded).await;
                if new_chapter {
                    self.emit(PlaybackEvent::ChapterLoaded {
                        chapter_id: chapter.id,
                        verse_count: chapter.len() as u32,
                    });
                }
                self.activate(ticket, index, true).await
            }
        }
    }

    async fn request_skip(&self, direction: SkipDirection) -> Result<()> {
        let (ticket, target) = {
            let mut session = self.inner.session.lock();
            let Some(chapter) = session.chapter.clone() else {
                return Err(PlaybackError::NoChapterLoaded);
            };
            if session.is_busy() {
                return Err(PlaybackError::Busy);
            }

            let target = match direction {
                SkipDirection::Next => Some(session.index + 1),
                SkipDirection::Previous => session.index.checked_sub(1),
            }
            .filter(|target| chapter.contains_index(*target));

            let Some(target) = target else {
                return Err(PlaybackError::InvalidIndex {
                    index: session.index,
                    len: chapter.len(),
                });
            };

            let ticket = session.bump();
            session.busy = Some(ticket);
            (ticket, target)
        };

        self.activate(ticket, target, true).await
    }

    async fn toggle(&self) -> Result<()> {
        let (handle, was_playing, finished, chapter_id, index) = {
            let mut session = self.inner.session.lock();
            let Some(handle) = session.active.clone() else {
                debug!("Toggle ignored without an active clip");
                return Ok(());
            };
            session.cancel_advance();
            let chapter_id = session.chapter.as_ref().map_or(0, |c| c.id);
            (
                handle,
                session.is_playing,
                session.finished,
                chapter_id,
                session.index,
            )
        };

        if was_playing {
            handle.pause().await?;
        } else {
            if finished {
                handle.seek(0).await?;
            }
            handle.play().await?;
        }

        let position_ms = {
            let mut session = self.inner.session.lock();
            if session.is_active(&handle) {
                session.is_playing = !was_playing;
                if finished {
                    session.finished = false;
                    session.position_ms = 0;
                }
            }
            session.position_ms
        };

        let index = index as u32;
        self.emit(if was_playing {
            PlaybackEvent::Paused {
                chapter_id,
                index,
                position_ms,
            }
        } else {
            PlaybackEvent::Resumed {
                chapter_id,
                index,
                position_ms,
            }
        });
        Ok(())
    }

    async fn seek_active(&self, position_ms: u64) -> Result<()> {
        let Some(handle) = self.inner.session.lock().active.clone() else {
            return Ok(());
        };

        let position_ms = handle.seek(position_ms).await?;

        let duration_ms = {
            let mut session = self.inner.session.lock();
            if session.is_active(&handle) {
                session.position_ms = position_ms;
            }
            session.duration_ms
        };

        self.emit(PlaybackEvent::PositionChanged {
            position_ms,
            duration_ms,
        });
        Ok(())
    }

    async fn swap_reciter(&self, reciter: Reciter) -> Result<()> {
        let reciter_id = reciter.id.clone();

        let (ticket, discarded, resume) = {
            let mut session = self.inner.session.lock();
            session.reciter = reciter;
            let ticket = session.bump();
            let resume = session
                .chapter
                .as_ref()
                .map(|_| (session.index, session.is_playing));
            session.busy = resume.map(|_| ticket);
            (ticket, session.take_all(), resume)
        };

        self.release_all(discarded).await;
        self.emit(PlaybackEvent::ReciterChanged { reciter_id });

        match resume {
            Some((index, was_playing)) => self.activate(ticket, index, was_playing).await,
            None => Ok(()),
        }
    }

    async fn on_clip_finished(&self, finished: Arc<ClipHandle>) -> Result<()> {
        let (chapter_id, index, step) = {
            let mut session = self.inner.session.lock();
            if !session.is_active(&finished) {
                return Ok(());
            }
            let Some(chapter) = session.chapter.clone() else {
                return Err(PlaybackError::NoChapterLoaded);
            };

            let index = session.index;
            let next = index + 1;

            let step = if chapter.contains_index(next) {
                if session.is_busy() {
                    return Err(PlaybackError::Busy);
                }
                let ticket = session.bump();
                session.busy = Some(ticket);
                AfterFinish::Advance { ticket, next }
            } else {
                // The handle stays active so re-tapping the last verse restarts it
                session.is_playing = false;
                session.position_ms = 0;
                session.finished = true;
                AfterFinish::ChapterEnd {
                    chapter_id: chapter.id,
                    ticket: session.ticket,
                }
            };
            (chapter.id, index, step)
        };

        self.emit(PlaybackEvent::Completed {
            chapter_id,
            index: index as u32,
        });

        match step {
            AfterFinish::Advance { ticket, next } => self.activate(ticket, next, true).await,
            AfterFinish::ChapterEnd { chapter_id, ticket } => {
                info!(chapter_id, "Chapter finished");
                self.emit(PlaybackEvent::ChapterFinished { chapter_id });

                let policy = self.inner.config.policy;
                if policy.auto_advance_chapter && chapter_id < LAST_CHAPTER_ID {
                    self.schedule_chapter_advance(chapter_id + 1, ticket);
                }
                Ok(())
            }
        }
    }

    // =========================================================================
    // Verse switching
    // =========================================================================

    /// Make `index` the active verse under `ticket`.
    ///
    /// Reuses a matching preloaded clip when one is ready, otherwise loads a
    /// fresh one. Preloads that are no longer adjacent are released.
    async fn activate(&self, ticket: u64, index: usize, play: bool) -> Result<()> {
        let plan = self.plan_switch(ticket, index)?;
        let chapter_id = plan.chapter.id;

        self.release_all(plan.discarded).await;

        if let Some(verse) = plan.chapter.verse(index) {
            self.emit(PlaybackEvent::VerseChanged {
                chapter_id,
                index: index as u32,
                verse_id: verse.id,
            });
        }

        let reused = match plan.reused {
            Some(handle) if handle.is_loaded().await => {
                debug!(index, "Promoting preloaded clip");
                Some(handle)
            }
            Some(handle) => {
                debug!(index, "Preloaded clip unusable, loading fresh");
                handle.release().await;
                None
            }
            None => None,
        };

        let handle = match reused {
            Some(handle) => handle,
            None => match ClipHandle::open(Arc::clone(&self.inner.player), plan.url).await {
                Ok(handle) => handle,
                Err(e) => {
                    let mut session = self.inner.session.lock();
                    session.check(ticket)?;
                    session.is_loading = false;
                    session.is_playing = false;
                    session.release_busy(ticket);
                    return Err(e);
                }
            },
        };

        self.commit(ticket, Arc::clone(&handle), play).await?;

        if play {
            self.emit(PlaybackEvent::Started {
                chapter_id,
                index: index as u32,
            });
        }

        if self.inner.config.policy.preload_adjacent {
            self.schedule_preloads(ticket, index);
        }
        Ok(())
    }

    fn plan_switch(&self, ticket: u64, index: usize) -> Result<SwitchPlan> {
        let mut session = self.inner.session.lock();
        session.check(ticket)?;

        let Some(chapter) = session.chapter.clone() else {
            session.release_busy(ticket);
            session.is_loading = false;
            return Err(PlaybackError::NoChapterLoaded);
        };

        if !chapter.contains_index(index) {
            session.release_busy(ticket);
            session.is_loading = false;
            return Err(PlaybackError::InvalidIndex {
                index,
                len: chapter.len(),
            });
        }

        session.busy = Some(ticket);
        let mut discarded: Vec<_> = session.active.take().into_iter().collect();
        let reused = session.slots.take_matching(index);
        discarded.extend(session.slots.retain_adjacent(index, chapter.len()));

        session.index = index;
        session.position_ms = 0;
        session.duration_ms = 0;
        session.finished = false;
        session.is_playing = false;
        session.is_loading = reused.is_none();

        let url = audio_locator(
            &self.inner.config.audio_base_url,
            &session.reciter.url_path,
            chapter.id,
            index,
        );

        Ok(SwitchPlan {
            chapter,
            discarded,
            reused,
            url,
        })
    }

    /// Install `handle` as the active clip and start it.
    async fn commit(&self, ticket: u64, handle: Arc<ClipHandle>, play: bool) -> Result<()> {
        let stale = {
            let mut session = self.inner.session.lock();
            match session.check(ticket) {
                Ok(()) => {
                    session.active = Some(Arc::clone(&handle));
                    session.is_loading = false;
                    session.is_playing = play;
                    session.release_busy(ticket);
                    None
                }
                Err(e) => Some(e),
            }
        };

        if let Some(stale) = stale {
            handle.release().await;
            return Err(stale);
        }

        let started = async {
            handle.attach(Arc::clone(&self.inner.sink)).await?;
            if play {
                handle.play().await?;
            }
            Ok::<_, PlaybackError>(())
        }
        .await;

        if let Err(e) = started {
            let mut session = self.inner.session.lock();
            if session.is_active(&handle) {
                session.is_playing = false;
            }
            return Err(PlaybackError::resource_unavailable(handle.url(), e));
        }

        debug!(clip = %strip_path(handle.url()), ticket, "Clip active");
        Ok(())
    }

    // =========================================================================
    // Preloading
    // =========================================================================

    fn schedule_preloads(&self, ticket: u64, index: usize) {
        let (generation, jobs) = {
            let mut session = self.inner.session.lock();
            if session.ticket != ticket {
                return;
            }
            let Some(chapter) = session.chapter.clone() else {
                return;
            };
            let generation = session.generation;

            let mut jobs = Vec::new();
            for side in [SlotSide::Previous, SlotSide::Next] {
                let Some(target) = side.target(index, chapter.len()) else {
                    continue;
                };
                if !session.slots.needs_preload(generation, target) {
                    continue;
                }
                session.slots.mark_in_flight(generation, target);
                let url = audio_locator(
                    &self.inner.config.audio_base_url,
                    &session.reciter.url_path,
                    chapter.id,
                    target,
                );
                jobs.push((side, target, url));
            }
            (generation, jobs)
        };

        for (side, target, url) in jobs {
            debug!(?side, index = target, ticket, "Preloading clip");
            let engine = self.clone();
            tokio::spawn(async move { engine.preload(generation, target, url).await });
        }
    }

    /// Load verse `index` and file it on whichever side it is adjacent to
    /// when the load lands.
    async fn preload(&self, generation: u64, index: usize, url: String) {
        let loaded = ClipHandle::open(Arc::clone(&self.inner.player), url).await;

        let to_release = {
            let mut session = self.inner.session.lock();
            let ours = session.slots.finish_in_flight(generation, index);

            match loaded {
                Ok(handle) => {
                    let len = session.chapter.as_ref().map_or(0, |chapter| chapter.len());
                    let active = session.index;
                    let side = [SlotSide::Previous, SlotSide::Next]
                        .into_iter()
                        .find(|side| side.target(active, len) == Some(index));

                    match side {
                        Some(side) if ours && session.generation == generation => {
                            session.slots.store(side, index, handle)
                        }
                        _ => {
                            debug!(index, generation, "Discarding stale preload");
                            Some(handle)
                        }
                    }
                }
                Err(e) => {
                    // The slot stays empty and the verse loads on demand later
                    debug!(index, error = %e, "Preload failed");
                    None
                }
            }
        };

        if let Some(handle) = to_release {
            handle.release().await;
        }
    }

    fn schedule_chapter_advance(&self, next_chapter: u32, ticket: u64) {
        let advance = {
            let mut session = self.inner.session.lock();
            if session.ticket != ticket {
                return;
            }
            session.cancel_advance();
            let advance = CancellationToken::new();
            session.pending_advance = Some(advance.clone());
            advance
        };
        let engine = Arc::downgrade(&self.inner);
        let delay = self.inner.config.policy.chapter_advance_delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = advance.cancelled() => {
                    debug!(next_chapter, "Chapter advance cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            let Some(inner) = engine.upgrade() else {
                return;
            };
            let engine = PlaybackEngine { inner };
            let current = {
                let mut session = engine.inner.session.lock();
                let current = session.ticket == ticket && !advance.is_cancelled();
                if current {
                    session.pending_advance = None;
                }
                current
            };
            if !current {
                debug!(next_chapter, "Chapter advance superseded");
                return;
            }
            info!(next_chapter, "Advancing to next chapter");
            let _ = engine.play_chapter(next_chapter, 0, true).await;
        });
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn release_all(&self, handles: Vec<Arc<ClipHandle>>) -> usize {
        let mut released = 0;
        for handle in handles {
            if handle.release().await {
                released += 1;
            }
        }
        released
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine
        let _ = self.inner.events.emit(CoreEvent::Playback(event));
    }

    /// Swallow silent outcomes; publish and return everything else.
    fn settle(&self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_silent() || matches!(e, PlaybackError::NoChapterLoaded) => {
                debug!(reason = %e, "Playback request dropped");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Playback operation failed");
                self.emit(PlaybackEvent::Error {
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.session.lock();
        f.debug_struct("PlaybackEngine")
            .field("chapter", &session.chapter.as_ref().map(|c| c.id))
            .field("index", &session.index)
            .field("ticket", &session.ticket)
            .field("is_playing", &session.is_playing)
            .finish()
    }
}
