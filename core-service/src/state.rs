//! Observable application state.

use core_library::models::{Chapter, Favorite, LastRead, Preferences, Reciter, ThemeMode};
use core_playback::PlaybackSnapshot;
use std::sync::Arc;

/// Everything the presentation layer renders, captured at one instant.
#[derive(Debug, Clone)]
pub struct AppState {
    pub is_playing: bool,
    pub is_loading: bool,
    pub active_chapter: Option<Arc<Chapter>>,
    /// Zero-based position of the active verse in `active_chapter`
    pub active_index: Option<usize>,
    pub active_verse_id: Option<u32>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub favorites: Vec<Favorite>,
    pub active_reciter: Reciter,
    pub theme_mode: ThemeMode,
    pub font_size: u32,
    pub show_translation: bool,
    pub last_read: Option<LastRead>,
}

impl AppState {
    pub(crate) fn compose(playback: PlaybackSnapshot, preferences: Preferences) -> Self {
        Self {
            is_playing: playback.is_playing,
            is_loading: playback.is_loading,
            active_chapter: playback.chapter,
            active_index: playback.index,
            active_verse_id: playback.active_verse_id,
            position_ms: playback.position_ms,
            duration_ms: playback.duration_ms,
            favorites: preferences.favorites,
            // The engine holds the reciter actually in use
            active_reciter: playback.reciter,
            theme_mode: preferences.theme_mode,
            font_size: preferences.font_size,
            show_translation: preferences.show_translation,
            last_read: preferences.last_read,
        }
    }

    pub fn is_favorite(&self, chapter_id: u32, verse_id: u32) -> bool {
        self.favorites
            .iter()
            .any(|favorite| favorite.matches(chapter_id, verse_id))
    }
}
