//! # Settings-backed repositories
//!
//! Everything the reader persists lives in the host [`SettingsStore`] as
//! plain strings or JSON strings.
//!
//! ## Available Repositories
//!
//! - `CachedChapterSource` - Read-through chapter cache in front of any `ChapterSource`
//! - `PreferencesRepository` - Favorites, last-read marker, reciter, theme, font size
//!
//! [`SettingsStore`]: bridge_traits::storage::SettingsStore

pub mod chapter_cache;
pub mod preferences;

pub use chapter_cache::{chapter_cache_key, CachedChapterSource, DEFAULT_MEMORY_CAPACITY};
pub use preferences::{keys, PreferencesRepository};
