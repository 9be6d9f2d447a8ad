//! Domain models for chapters, verses and reader preferences
//!
//! The serde layout of every persisted record matches the keys already written
//! by installed clients, so field names are renamed rather than restructured.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First valid chapter id.
pub const FIRST_CHAPTER_ID: u32 = 1;
/// Last valid chapter id.
pub const LAST_CHAPTER_ID: u32 = 114;

/// Font size bounds for the reading view.
pub const MIN_FONT_SIZE: u32 = 12;
pub const MAX_FONT_SIZE: u32 = 64;
pub const DEFAULT_FONT_SIZE: u32 = 28;

pub fn is_valid_chapter_id(chapter_id: u32) -> bool {
    (FIRST_CHAPTER_ID..=LAST_CHAPTER_ID).contains(&chapter_id)
}

pub fn clamp_font_size(size: u32) -> u32 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

// =============================================================================
// Chapter
// =============================================================================

/// One chapter with its ordered verses.
///
/// Immutable once resolved. A playback session replaces it wholesale when a
/// different chapter is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: u32,
    /// Name in the primary script.
    pub name_ar: String,
    /// Transliterated name.
    pub name_en: String,
    pub verses: Vec<Verse>,
}

impl Chapter {
    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }

    /// Verse at a zero-based position.
    pub fn verse(&self, index: usize) -> Option<&Verse> {
        self.verses.get(index)
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index < self.verses.len()
    }

    /// Zero-based position of the verse with the given global id.
    pub fn index_of_verse(&self, verse_id: u32) -> Option<usize> {
        self.verses.iter().position(|v| v.id == verse_id)
    }

    /// Validate chapter data
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_chapter_id(self.id) {
            return Err(format!(
                "Chapter id {} outside {}..={}",
                self.id, FIRST_CHAPTER_ID, LAST_CHAPTER_ID
            ));
        }

        if self.verses.is_empty() {
            return Err("Chapter has no verses".to_string());
        }

        for (position, verse) in self.verses.iter().enumerate() {
            verse.validate()?;
            if verse.number_in_chapter as usize != position + 1 {
                return Err(format!(
                    "Verse {} has ordinal {} at position {}",
                    verse.id, verse.number_in_chapter, position
                ));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Verse
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verse {
    /// Globally unique verse number across all chapters.
    pub id: u32,
    /// 1-based ordinal within the chapter.
    #[serde(rename = "numberInSurah")]
    pub number_in_chapter: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// Edition audio URL reported by the content API.
    #[serde(rename = "audio", default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl Verse {
    pub fn validate(&self) -> Result<(), String> {
        if self.id == 0 {
            return Err("Verse id must be positive".to_string());
        }
        if self.number_in_chapter == 0 {
            return Err(format!("Verse {} has ordinal 0", self.id));
        }
        Ok(())
    }
}

// =============================================================================
// Reciter
// =============================================================================

/// A named audio source. `url_path` selects the recitation folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reciter {
    pub id: String,
    pub name: String,
    pub url_path: String,
}

impl Reciter {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url_path: url_path.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Reciter id cannot be empty".to_string());
        }
        if self.url_path.trim().is_empty() {
            return Err("Reciter url path cannot be empty".to_string());
        }
        if self.url_path.contains('/') {
            return Err("Reciter url path must be a single segment".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Favorites and reading position
// =============================================================================

/// A bookmarked verse with a snapshot of its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    #[serde(rename = "surahId")]
    pub chapter_id: u32,
    #[serde(rename = "verseId")]
    pub verse_id: u32,
    #[serde(rename = "surahName")]
    pub chapter_name: String,
    #[serde(rename = "nameAr")]
    pub name_ar: String,
    #[serde(rename = "verseNum")]
    pub verse_number: u32,
    pub text: String,
}

impl Favorite {
    pub fn from_verse(chapter: &Chapter, verse: &Verse) -> Self {
        Self {
            chapter_id: chapter.id,
            verse_id: verse.id,
            chapter_name: chapter.name_en.clone(),
            name_ar: chapter.name_ar.clone(),
            verse_number: verse.number_in_chapter,
            text: verse.text.clone(),
        }
    }

    pub fn matches(&self, chapter_id: u32, verse_id: u32) -> bool {
        self.chapter_id == chapter_id && self.verse_id == verse_id
    }
}

/// The single most recent bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRead {
    #[serde(rename = "surahId")]
    pub chapter_id: u32,
    #[serde(rename = "verseId")]
    pub verse_id: u32,
    #[serde(rename = "verseNum")]
    pub verse_number: u32,
    #[serde(rename = "nameEn")]
    pub name_en: String,
    #[serde(rename = "nameAr")]
    pub name_ar: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

// =============================================================================
// Preferences
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::System => "system",
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(ThemeMode::System),
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(format!("Unknown theme mode: {}", other)),
        }
    }
}

/// Everything the reader persists between launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub favorites: Vec<Favorite>,
    pub active_reciter: Reciter,
    pub theme_mode: ThemeMode,
    pub font_size: u32,
    pub show_translation: bool,
    pub last_read: Option<LastRead>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            favorites: Vec::new(),
            active_reciter: crate::reciters::default_reciter(),
            theme_mode: ThemeMode::default(),
            font_size: DEFAULT_FONT_SIZE,
            show_translation: false,
            last_read: None,
        }
    }
}

impl Preferences {
    pub fn is_favorite(&self, chapter_id: u32, verse_id: u32) -> bool {
        self.favorites
            .iter()
            .any(|favorite| favorite.matches(chapter_id, verse_id))
    }
}
