//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (clip player, HTTP,
//! settings, background executor) into the shared recitation core and exposes
//! one object the presentation layer drives. Desktop apps typically enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) so the settings
//! store and HTTP client default to the bundled implementations.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .clip_player(player)
//!     .build()?;
//! let core = CoreService::bootstrap(config).await?;
//! core.play_chapter(112, 0, true).await?;
//! ```

pub mod error;
pub mod prefetch;
pub mod state;

pub use error::{CoreError, Result};
pub use prefetch::{PrefetchRunner, PREFETCH_TASK_ID};
pub use state::AppState;

pub use core_runtime::{config, events, logging};

use bridge_traits::background::{BackgroundExecutor, TaskConstraints, TaskId};
use core_library::models::{Chapter, Favorite, LastRead, Preferences, Reciter, ThemeMode, Verse};
use core_library::prefetch::{ChapterPrefetcher, PrefetchOutcome};
use core_library::reciters;
use core_library::repositories::{CachedChapterSource, PreferencesRepository};
use core_library::source::ChapterSource;
use core_playback::{EngineConfig, PlaybackEngine, SkipDirection};
use core_runtime::config::CoreConfig;
use core_runtime::events::{
    ContentEvent, CoreEvent, EventBus, EventStream, PreferencesEvent, Receiver,
    DEFAULT_EVENT_BUFFER_SIZE,
};
use parking_lot::{Mutex, RwLock};
use provider_alquran::AlQuranProvider;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
use bridge_desktop::TokioBackgroundExecutor;

type ContentSource = CachedChapterSource<AlQuranProvider>;

struct ServiceInner {
    config: CoreConfig,
    events: EventBus,
    preferences: PreferencesRepository,
    // Mirror of the persisted preferences, refreshed after every write
    snapshot: RwLock<Preferences>,
    content: Arc<ContentSource>,
    engine: PlaybackEngine,
    prefetch: PrefetchRunner,
    prefetch_task: Mutex<Option<TaskId>>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Build every component from `config` and load persisted preferences.
    ///
    /// Must be called from within a Tokio runtime. When
    /// `enable_background_prefetch` is set, the prefetch task is scheduled on
    /// the configured executor; a scheduling failure is logged and does not
    /// abort startup.
    #[instrument(skip(config))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let events = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);

        let preferences = PreferencesRepository::new(
            Arc::clone(&config.settings_store),
            Arc::clone(&config.clock),
        );
        let loaded = preferences.load().await?;

        let provider = AlQuranProvider::from_config(Arc::clone(&config.http_client), &config.content);
        let content = Arc::new(CachedChapterSource::new(
            provider,
            Arc::clone(&config.settings_store),
        ));
        let source: Arc<dyn ChapterSource> = content.clone();

        let engine = PlaybackEngine::new(
            Arc::clone(&config.clip_player),
            Arc::clone(&source),
            loaded.active_reciter.clone(),
            EngineConfig::from_core(&config),
            events.clone(),
        );

        let prefetcher = ChapterPrefetcher::new(source, Arc::clone(&config.settings_store));
        let prefetch = PrefetchRunner::new(Arc::new(prefetcher), events.clone());

        let schedule = config.enable_background_prefetch;
        let service = Self {
            inner: Arc::new(ServiceInner {
                config,
                events,
                preferences,
                snapshot: RwLock::new(loaded),
                content,
                engine,
                prefetch,
                prefetch_task: Mutex::new(None),
            }),
        };

        if schedule {
            if let Err(e) = service.schedule_prefetch().await {
                warn!(error = %e, "Background prefetch not scheduled");
            }
        }

        info!(
            reciter = %service.inner.engine.reciter().id,
            "Core service ready"
        );
        Ok(service)
    }

    // =========================================================================
    // Playback
    // =========================================================================

    pub async fn play_chapter(&self, chapter_id: u32, start_index: usize, auto_play: bool) -> Result<()> {
        self.inner
            .engine
            .play_chapter(chapter_id, start_index, auto_play)
            .await?;
        Ok(())
    }

    pub async fn play_verse_at(&self, chapter: Arc<Chapter>, index: usize) -> Result<()> {
        self.inner.engine.play_verse_at(chapter, index).await?;
        Ok(())
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.inner.engine.toggle_play_pause().await?;
        Ok(())
    }

    pub async fn skip(&self, direction: SkipDirection) -> Result<()> {
        self.inner.engine.skip(direction).await?;
        Ok(())
    }

    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        self.inner.engine.seek(position_ms).await?;
        Ok(())
    }

    /// Persist `reciter` as the active reciter, then reload the active verse
    /// under it.
    ///
    /// # Errors
    /// - `Library(InvalidInput)` if the reciter is malformed; nothing changes
    /// - `Playback` if the verse clip cannot be reloaded; the choice is kept
    #[instrument(skip(self, reciter), fields(reciter = %reciter.id))]
    pub async fn change_reciter(&self, reciter: Reciter) -> Result<()> {
        self.inner.preferences.set_active_reciter(&reciter).await?;
        self.inner.snapshot.write().active_reciter = reciter.clone();
        self.inner.engine.change_reciter(reciter).await?;
        Ok(())
    }

    /// [`change_reciter`](Self::change_reciter) by catalog id.
    pub async fn select_reciter(&self, reciter_id: &str) -> Result<()> {
        let reciter = reciters::find_reciter(reciter_id)
            .ok_or_else(|| CoreError::UnknownReciter(reciter_id.to_string()))?;
        self.change_reciter(reciter).await
    }

    /// Resolve a chapter through the cache, for callers that render it before
    /// playing.
    pub async fn chapter(&self, chapter_id: u32) -> Result<Arc<Chapter>> {
        Ok(Arc::new(self.inner.content.resolve_chapter(chapter_id).await?))
    }

    /// Make a chapter available offline.
    pub async fn cache_chapter(&self, chapter_id: u32) -> Result<()> {
        if self.inner.content.cache_chapter(chapter_id).await? {
            self.emit(CoreEvent::Content(ContentEvent::ChapterCached { chapter_id }));
        }
        Ok(())
    }

    /// Release every clip and stop background prefetch.
    pub async fn shutdown(&self) {
        self.inner.engine.shutdown().await;

        let task = self.inner.prefetch_task.lock().take();
        if let (Some(task), Some(executor)) = (task, self.inner.config.background_executor.as_ref()) {
            if let Err(e) = executor.cancel_task(&task).await {
                warn!(error = %e, "Failed to cancel prefetch task");
            }
        }
        info!("Core service shut down");
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.inner.engine
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    /// Add or remove a verse from the favorites.
    ///
    /// # Returns
    /// Whether the verse is a favorite afterwards.
    pub async fn toggle_favorite(&self, chapter: &Chapter, verse: &Verse) -> Result<bool> {
        // The mirror is updated under the repository's favorites lock, so
        // concurrent toggles cannot publish out of order
        let snapshot = &self.inner.snapshot;
        let favorites = self
            .inner
            .preferences
            .toggle_favorite_with(chapter, verse, |favorites| {
                snapshot.write().favorites = favorites.to_vec();
            })
            .await?;
        let now_favorite = favorites
            .iter()
            .any(|favorite| favorite.matches(chapter.id, verse.id));
        let count = favorites.len();

        self.emit(CoreEvent::Preferences(PreferencesEvent::FavoritesChanged {
            count,
        }));
        Ok(now_favorite)
    }

    pub fn is_favorite(&self, chapter_id: u32, verse_id: u32) -> bool {
        self.inner.snapshot.read().is_favorite(chapter_id, verse_id)
    }

    pub fn favorites(&self) -> Vec<Favorite> {
        self.inner.snapshot.read().favorites.clone()
    }

    pub async fn save_last_read(
        &self,
        chapter_id: u32,
        verse_id: u32,
        verse_number: u32,
        name_en: &str,
        name_ar: &str,
    ) -> Result<LastRead> {
        let marker = self
            .inner
            .preferences
            .save_last_read(chapter_id, verse_id, verse_number, name_en, name_ar)
            .await?;

        self.inner.snapshot.write().last_read = Some(marker.clone());
        self.emit(CoreEvent::Preferences(PreferencesEvent::LastReadSaved {
            chapter_id,
            verse_id,
        }));
        Ok(marker)
    }

    pub fn last_read(&self) -> Option<LastRead> {
        self.inner.snapshot.read().last_read.clone()
    }

    pub async fn set_theme_mode(&self, mode: ThemeMode) -> Result<()> {
        self.inner.preferences.set_theme_mode(mode).await?;
        self.inner.snapshot.write().theme_mode = mode;
        self.emit(CoreEvent::Preferences(PreferencesEvent::ThemeChanged {
            mode: mode.as_str().to_string(),
        }));
        Ok(())
    }

    /// Persist the reading font size, clamped to the supported range.
    pub async fn set_font_size(&self, size: u32) -> Result<u32> {
        let size = self.inner.preferences.set_font_size(size).await?;
        self.inner.snapshot.write().font_size = size;
        self.emit(CoreEvent::Preferences(PreferencesEvent::FontSizeChanged {
            size,
        }));
        Ok(size)
    }

    pub async fn set_show_translation(&self, enabled: bool) -> Result<()> {
        self.inner.preferences.set_show_translation(enabled).await?;
        self.inner.snapshot.write().show_translation = enabled;
        self.emit(CoreEvent::Preferences(PreferencesEvent::TranslationToggled {
            enabled,
        }));
        Ok(())
    }

    /// Built-in reciters, default first.
    pub fn reciters(&self) -> Vec<Reciter> {
        reciters::catalog()
    }

    // =========================================================================
    // Prefetch
    // =========================================================================

    /// Cache the next chapter after the persisted prefetch cursor.
    pub async fn run_prefetch_step(&self) -> Result<PrefetchOutcome> {
        Ok(self.inner.prefetch.run().await?)
    }

    /// Runner to register as the [`PREFETCH_TASK_ID`] handler on a host
    /// executor.
    pub fn prefetch_runner(&self) -> PrefetchRunner {
        self.inner.prefetch.clone()
    }

    /// Schedule [`PREFETCH_TASK_ID`] on the configured executor.
    ///
    /// The executor must already know how to run the task.
    pub async fn schedule_prefetch(&self) -> Result<TaskId> {
        let executor = self
            .inner
            .config
            .background_executor
            .as_ref()
            .ok_or_else(|| CoreError::CapabilityMissing {
                capability: "BackgroundExecutor".to_string(),
                message: "Background prefetch needs a background executor".to_string(),
            })?;

        let task = executor
            .schedule_task(
                PREFETCH_TASK_ID,
                self.inner.config.prefetch.interval,
                TaskConstraints::default(),
            )
            .await?;

        info!(interval_secs = self.inner.config.prefetch.interval.as_secs(), "Prefetch scheduled");
        *self.inner.prefetch_task.lock() = Some(task.clone());
        Ok(task)
    }

    /// Register the prefetch handler on a desktop executor and schedule it.
    ///
    /// `executor` must be the instance passed to the config builder.
    #[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
    pub async fn start_desktop_prefetch(&self, executor: &TokioBackgroundExecutor) -> Result<TaskId> {
        use bridge_traits::BridgeError;

        let runner = self.prefetch_runner();
        executor
            .register_task_handler(PREFETCH_TASK_ID, move || {
                let runner = runner.clone();
                async move {
                    runner
                        .run()
                        .await
                        .map(|_| ())
                        .map_err(|e| BridgeError::OperationFailed(e.to_string()))
                }
            })
            .await?;

        self.schedule_prefetch().await
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn state(&self) -> AppState {
        let preferences = self.inner.snapshot.read().clone();
        AppState::compose(self.inner.engine.snapshot(), preferences)
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    /// Playback events only, for transport controls and now-playing views.
    pub fn playback_events(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
            .filter(|event| matches!(event, CoreEvent::Playback(_)))
    }

    pub fn events(&self) -> EventBus {
        self.inner.events.clone()
    }

    fn emit(&self, event: CoreEvent) {
        let _ = self.inner.events.emit(event);
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("engine", &self.inner.engine)
            .field("events", &self.inner.events)
            .finish()
    }
}
