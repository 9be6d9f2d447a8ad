//! End-to-end tests for the service façade with the desktop settings store
//! and scripted content and audio adapters.

use async_trait::async_trait;
use bridge_desktop::{SqliteSettingsStore, TokioBackgroundExecutor};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playback::{ClipId, ClipPlayer, ClipSource, ClipStatusSink};
use bridge_traits::storage::SettingsStore;
use bridge_traits::background::BackgroundExecutor;
use bytes::Bytes;
use core_library::models::ThemeMode;
use core_library::prefetch::PrefetchOutcome;
use core_playback::PlaybackError;
use core_runtime::config::{ContentConfig, CoreConfig, PrefetchConfig};
use core_runtime::events::{ContentEvent, CoreEvent, PlaybackEvent, PreferencesEvent};
use core_service::{CoreError, CoreService};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

const API_BASE: &str = "https://api.test/v1";
const AUDIO_BASE: &str = "https://audio.test/data";

// ============================================================================
// Fakes
// ============================================================================

/// Serves `{base}/surah/{id}/{edition}` with three synthetic verses per chapter.
#[derive(Default)]
struct ScriptedApi {
    requests: Mutex<Vec<String>>,
    offline: Mutex<HashSet<u32>>,
}

impl ScriptedApi {
    fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn take_offline(&self, chapter_id: u32) {
        self.offline.lock().insert(chapter_id);
    }

    fn body(chapter_id: u32, edition: &str) -> serde_json::Value {
        let ayahs: Vec<_> = (1..=3)
            .map(|n| {
                json!({
                    "number": chapter_id * 10 + n,
                    "numberInSurah": n,
                    "text": format!("{} {}:{}", edition, chapter_id, n),
                })
            })
            .collect();
        json!({
            "code": 200,
            "status": "OK",
            "data": {
                "number": chapter_id,
                "name": format!("سورة {}", chapter_id),
                "englishName": format!("Chapter {}", chapter_id),
                "ayahs": ayahs
            }
        })
    }
}

#[async_trait]
impl HttpClient for ScriptedApi {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().push(request.url.clone());

        let path = request
            .url
            .strip_prefix(&format!("{}/surah/", API_BASE))
            .ok_or_else(|| BridgeError::OperationFailed(format!("unexpected url {}", request.url)))?;
        let (id, edition) = path
            .split_once('/')
            .ok_or_else(|| BridgeError::OperationFailed("missing edition".into()))?;
        let chapter_id: u32 = id
            .parse()
            .map_err(|_| BridgeError::OperationFailed("bad chapter id".into()))?;

        if self.offline.lock().contains(&chapter_id) {
            return Err(BridgeError::OperationFailed("network unreachable".into()));
        }

        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(Self::body(chapter_id, edition).to_string()),
        })
    }
}

#[derive(Default)]
struct RecordingPlayer {
    urls: Mutex<HashMap<ClipId, String>>,
    playing: Mutex<HashSet<ClipId>>,
}

impl RecordingPlayer {
    fn playing_urls(&self) -> Vec<String> {
        let urls = self.urls.lock();
        self.playing
            .lock()
            .iter()
            .filter_map(|id| urls.get(id).cloned())
            .collect()
    }

    fn live(&self) -> usize {
        self.urls.lock().len()
    }
}

#[async_trait]
impl ClipPlayer for RecordingPlayer {
    async fn load(&self, source: ClipSource) -> BridgeResult<ClipId> {
        let id = ClipId::new();
        self.urls.lock().insert(id, source.url);
        Ok(id)
    }
    async fn play(&self, clip: ClipId) -> BridgeResult<()> {
        self.playing.lock().insert(clip);
        Ok(())
    }
    async fn pause(&self, clip: ClipId) -> BridgeResult<()> {
        self.playing.lock().remove(&clip);
        Ok(())
    }
    async fn stop(&self, clip: ClipId) -> BridgeResult<()> {
        self.playing.lock().remove(&clip);
        Ok(())
    }
    async fn seek(&self, _clip: ClipId, _position: Duration) -> BridgeResult<()> {
        Ok(())
    }
    async fn unload(&self, clip: ClipId) -> BridgeResult<()> {
        self.playing.lock().remove(&clip);
        self.urls.lock().remove(&clip);
        Ok(())
    }
    async fn attach_status(&self, _clip: ClipId, _sink: Arc<dyn ClipStatusSink>) -> BridgeResult<()> {
        Ok(())
    }
    async fn detach_status(&self, _clip: ClipId) -> BridgeResult<()> {
        Ok(())
    }
}

struct Fixture {
    core: CoreService,
    store: Arc<SqliteSettingsStore>,
    api: Arc<ScriptedApi>,
    player: Arc<RecordingPlayer>,
}

fn content() -> ContentConfig {
    ContentConfig::default()
        .with_api_base_url(API_BASE)
        .with_audio_base_url(AUDIO_BASE)
}

async fn store() -> Arc<SqliteSettingsStore> {
    Arc::new(SqliteSettingsStore::in_memory().await.unwrap())
}

async fn fixture_with(store: Arc<SqliteSettingsStore>) -> Fixture {
    let api = Arc::new(ScriptedApi::default());
    let player = Arc::new(RecordingPlayer::default());

    let config = CoreConfig::builder()
        .clip_player(player.clone())
        .settings_store(store.clone())
        .http_client(api.clone())
        .content(content())
        .build()
        .unwrap();

    Fixture {
        core: CoreService::bootstrap(config).await.unwrap(),
        store,
        api,
        player,
    }
}

async fn fixture() -> Fixture {
    fixture_with(store().await).await
}

// ============================================================================
// Bootstrap and playback
// ============================================================================

#[tokio::test]
async fn test_bootstrap_with_empty_store_uses_defaults() {
    let f = fixture().await;
    let state = f.core.state();

    assert!(!state.is_playing);
    assert!(state.active_chapter.is_none());
    assert_eq!(state.active_reciter.id, "mishary");
    assert_eq!(state.theme_mode, ThemeMode::System);
    assert_eq!(state.font_size, 28);
    assert!(!state.show_translation);
    assert!(state.favorites.is_empty());
    assert!(state.last_read.is_none());
    assert_eq!(f.core.reciters().len(), 3);
}

#[tokio::test]
async fn test_play_chapter_fetches_once_then_serves_from_cache() {
    let f = fixture().await;

    f.core.play_chapter(112, 0, true).await.unwrap();

    let state = f.core.state();
    assert!(state.is_playing);
    assert_eq!(state.active_chapter.as_ref().map(|c| c.id), Some(112));
    assert_eq!(state.active_verse_id, Some(1121));
    assert_eq!(
        state.active_chapter.unwrap().verses[0].translation.as_deref(),
        Some("en.sahih 112:1")
    );
    assert!(f
        .player
        .playing_urls()
        .contains(&format!("{}/Alafasy_128kbps/112001.mp3", AUDIO_BASE)));

    let fetched = f.api.request_count();
    assert_eq!(fetched, 2);
    f.core.play_chapter(112, 2, true).await.unwrap();
    assert_eq!(f.api.request_count(), fetched);
}

#[tokio::test]
async fn test_playback_stream_skips_preference_events() {
    let f = fixture().await;
    let mut stream = f.core.playback_events();

    f.core.set_font_size(30).await.unwrap();
    f.core.play_chapter(1, 0, true).await.unwrap();

    let first = stream.try_recv().unwrap().unwrap();
    assert_eq!(
        first,
        CoreEvent::Playback(PlaybackEvent::ChapterLoaded {
            chapter_id: 1,
            verse_count: 3
        })
    );
}

#[tokio::test]
async fn test_unreachable_chapter_surfaces_content_error() {
    let f = fixture().await;
    f.api.take_offline(5);

    let err = f.core.play_chapter(5, 0, true).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Playback(PlaybackError::ContentUnavailable { chapter_id: 5, .. })
    ));
    assert!(f.core.state().active_chapter.is_none());
}

#[tokio::test]
async fn test_select_reciter_persists_and_reloads() {
    let f = fixture().await;
    f.core.play_chapter(1, 1, true).await.unwrap();

    f.core.select_reciter("sudais").await.unwrap();

    let state = f.core.state();
    assert_eq!(state.active_reciter.id, "sudais");
    assert_eq!(state.active_index, Some(1));
    assert!(f.player.playing_urls().contains(&format!(
        "{}/Abdurrahmaan_As-Sudais_192kbps/001002.mp3",
        AUDIO_BASE
    )));

    let stored = f.store.get_string("activeReciter").await.unwrap().unwrap();
    assert!(stored.contains("\"sudais\""));

    let err = f.core.select_reciter("nobody").await.unwrap_err();
    assert!(matches!(err, CoreError::UnknownReciter(_)));
}

#[tokio::test]
async fn test_persisted_reciter_is_used_after_restart() {
    let store = store().await;
    {
        let f = fixture_with(store.clone()).await;
        f.core.select_reciter("basit").await.unwrap();
        f.core.shutdown().await;
    }

    let f = fixture_with(store).await;
    assert_eq!(f.core.state().active_reciter.id, "basit");

    f.core.play_chapter(2, 0, true).await.unwrap();
    assert!(f.player.playing_urls().contains(&format!(
        "{}/Abdul_Basit_Murattal_192kbps/002001.mp3",
        AUDIO_BASE
    )));
}

#[tokio::test]
async fn test_shutdown_releases_clips() {
    let f = fixture().await;
    f.core.play_chapter(3, 1, true).await.unwrap();

    f.core.shutdown().await;

    assert!(f.player.playing_urls().is_empty());
    // Preloads still in flight are released when they land
    for _ in 0..100 {
        if f.player.live() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(f.player.live(), 0);
    assert!(f.core.state().active_chapter.is_none());
}

// ============================================================================
// Preferences
// ============================================================================

#[tokio::test]
async fn test_toggle_favorite_round_trip() {
    let f = fixture().await;
    let mut events = f.core.subscribe_events();
    let chapter = f.core.chapter(112).await.unwrap();
    let verse = &chapter.verses[1];

    assert!(f.core.toggle_favorite(&chapter, verse).await.unwrap());
    assert!(f.core.is_favorite(112, verse.id));
    assert_eq!(f.core.state().favorites.len(), 1);
    assert!(matches!(
        events.try_recv().unwrap(),
        CoreEvent::Preferences(PreferencesEvent::FavoritesChanged { count: 1 })
    ));

    let stored = f.store.get_string("favorites").await.unwrap().unwrap();
    assert!(stored.contains("\"surahId\":112"));

    assert!(!f.core.toggle_favorite(&chapter, verse).await.unwrap());
    assert!(!f.core.is_favorite(112, verse.id));
    assert!(f.core.favorites().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_favorite_toggles_leave_state_matching_store() {
    let f = fixture().await;
    let chapter = f.core.chapter(2).await.unwrap();

    let tasks: Vec<_> = (0..3)
        .flat_map(|_| 0..chapter.verses.len())
        .map(|index| {
            let core = f.core.clone();
            let chapter = Arc::clone(&chapter);
            tokio::spawn(async move {
                core.toggle_favorite(&chapter, &chapter.verses[index])
                    .await
                    .unwrap()
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    // Every verse was toggled three times, so each ends up a favorite
    let stored: Vec<serde_json::Value> =
        serde_json::from_str(&f.store.get_string("favorites").await.unwrap().unwrap()).unwrap();
    let mut stored_ids: Vec<u64> = stored
        .iter()
        .map(|favorite| favorite["verseId"].as_u64().unwrap())
        .collect();
    stored_ids.sort_unstable();

    let mut published: Vec<u64> = f
        .core
        .favorites()
        .iter()
        .map(|favorite| u64::from(favorite.verse_id))
        .collect();
    published.sort_unstable();

    assert_eq!(stored_ids, vec![21, 22, 23]);
    assert_eq!(published, stored_ids);
}

#[tokio::test]
async fn test_save_last_read() {
    let f = fixture().await;

    let marker = f
        .core
        .save_last_read(18, 2150, 10, "Al-Kahf", "الكهف")
        .await
        .unwrap();

    assert_eq!(f.core.last_read(), Some(marker.clone()));
    assert!(marker.timestamp > 0);
    let stored = f.store.get_string("last_read").await.unwrap().unwrap();
    assert!(stored.contains("\"verseNum\":10"));
}

#[tokio::test]
async fn test_display_preferences_persist_and_notify() {
    let f = fixture().await;
    let mut events = f.core.subscribe_events();

    assert_eq!(f.core.set_font_size(100).await.unwrap(), 64);
    f.core.set_theme_mode(ThemeMode::Dark).await.unwrap();
    f.core.set_show_translation(true).await.unwrap();

    let state = f.core.state();
    assert_eq!(state.font_size, 64);
    assert_eq!(state.theme_mode, ThemeMode::Dark);
    assert!(state.show_translation);

    assert_eq!(f.store.get_string("fontSize").await.unwrap().as_deref(), Some("64"));
    assert_eq!(f.store.get_string("themeMode").await.unwrap().as_deref(), Some("dark"));
    assert_eq!(
        f.store.get_string("showTranslation").await.unwrap().as_deref(),
        Some("true")
    );

    let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        received,
        vec![
            CoreEvent::Preferences(PreferencesEvent::FontSizeChanged { size: 64 }),
            CoreEvent::Preferences(PreferencesEvent::ThemeChanged {
                mode: "dark".to_string()
            }),
            CoreEvent::Preferences(PreferencesEvent::TranslationToggled { enabled: true }),
        ]
    );
}

// ============================================================================
// Prefetch
// ============================================================================

#[tokio::test]
async fn test_prefetch_steps_advance_cursor() {
    let f = fixture().await;
    let mut events = f.core.subscribe_events();
    f.api.take_offline(2);

    assert_eq!(f.core.run_prefetch_step().await.unwrap(), PrefetchOutcome::Cached(1));
    assert_eq!(f.core.run_prefetch_step().await.unwrap(), PrefetchOutcome::Failed(2));
    assert_eq!(
        f.store.get_string("last_bg_download_id").await.unwrap().as_deref(),
        Some("1")
    );

    let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(matches!(
        received.as_slice(),
        [
            CoreEvent::Content(ContentEvent::PrefetchAdvanced { chapter_id: 1 }),
            CoreEvent::Content(ContentEvent::PrefetchFailed { chapter_id: 2, .. }),
        ]
    ));
}

#[tokio::test]
async fn test_schedule_prefetch_requires_executor() {
    let f = fixture().await;

    let err = f.core.schedule_prefetch().await.unwrap_err();
    assert!(matches!(err, CoreError::CapabilityMissing { .. }));
}

#[tokio::test]
async fn test_desktop_prefetch_runs_and_stops_on_shutdown() {
    let store = store().await;
    let executor = Arc::new(TokioBackgroundExecutor::new());
    let config = CoreConfig::builder()
        .clip_player(Arc::new(RecordingPlayer::default()))
        .settings_store(store.clone())
        .http_client(Arc::new(ScriptedApi::default()))
        .background_executor(executor.clone())
        .prefetch(PrefetchConfig {
            interval: Duration::from_secs(3600),
        })
        .content(content())
        .build()
        .unwrap();
    let core = CoreService::bootstrap(config).await.unwrap();

    core.start_desktop_prefetch(&executor).await.unwrap();

    let mut cursor = None;
    for _ in 0..200 {
        cursor = store.get_string("last_bg_download_id").await.unwrap();
        if cursor.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(cursor.as_deref(), Some("1"));

    core.shutdown().await;
    assert!(executor.list_tasks().await.unwrap().is_empty());
}
