//! # Content Library Module
//!
//! Domain model and content access for the recitation core.
//!
//! ## Overview
//!
//! This module manages:
//! - Chapters, verses, reciters and reader preferences
//! - Per-verse audio addressing for each reciter
//! - The [`ChapterSource`] contract consumed by playback
//! - A settings-backed read-through chapter cache
//! - Favorites, last-read marker and display preferences
//! - Sequential offline prefetch of chapters

pub mod error;
pub mod models;
pub mod prefetch;
pub mod reciters;
pub mod repositories;
pub mod source;

pub use error::{LibraryError, Result};
pub use models::{Chapter, Favorite, LastRead, Preferences, Reciter, ThemeMode, Verse};
pub use prefetch::{ChapterPrefetcher, PrefetchOutcome};
pub use repositories::{CachedChapterSource, PreferencesRepository};
pub use source::ChapterSource;
