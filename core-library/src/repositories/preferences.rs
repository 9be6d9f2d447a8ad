//! Preferences repository
//!
//! Every value is written as a string so the layout matches what existing
//! installs already hold: JSON for records, decimal for the font size and
//! `"true"`/`"false"` for the translation toggle.

use crate::error::{LibraryError, Result};
use crate::models::{
    clamp_font_size, Chapter, Favorite, LastRead, Preferences, Reciter, ThemeMode, Verse,
    DEFAULT_FONT_SIZE,
};
use crate::reciters::default_reciter;
use bridge_traits::storage::SettingsStore;
use bridge_traits::time::Clock;
use futures::lock::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Settings keys owned by the preferences repository.
pub mod keys {
    pub const FAVORITES: &str = "favorites";
    pub const ACTIVE_RECITER: &str = "activeReciter";
    pub const THEME_MODE: &str = "themeMode";
    pub const FONT_SIZE: &str = "fontSize";
    pub const SHOW_TRANSLATION: &str = "showTranslation";
    pub const LAST_READ: &str = "last_read";
}

pub struct PreferencesRepository {
    store: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    // Serializes read-modify-write of the favorites list
    favorites_lock: Mutex<()>,
}

impl PreferencesRepository {
    pub fn new(store: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            favorites_lock: Mutex::new(()),
        }
    }

    /// Load every preference, falling back to the default for any value that
    /// is missing or unreadable.
    ///
    /// # Errors
    /// Only store failures are returned. Malformed values are logged.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Preferences> {
        let preferences = Preferences {
            favorites: self.favorites().await?,
            active_reciter: self.active_reciter().await?,
            theme_mode: self.theme_mode().await?,
            font_size: self.font_size().await?,
            show_translation: self.show_translation().await?,
            last_read: self.last_read().await?,
        };

        debug!(
            favorites = preferences.favorites.len(),
            reciter = %preferences.active_reciter.id,
            "Preferences loaded"
        );
        Ok(preferences)
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    pub async fn favorites(&self) -> Result<Vec<Favorite>> {
        Ok(self
            .read_json::<Vec<Favorite>>(keys::FAVORITES)
            .await?
            .unwrap_or_default())
    }

    /// Add the verse to favorites, or remove it if it is already there.
    ///
    /// # Returns
    /// The favorites list after the change, as persisted.
    pub async fn toggle_favorite(&self, chapter: &Chapter, verse: &Verse) -> Result<Vec<Favorite>> {
        self.toggle_favorite_with(chapter, verse, |_| {}).await
    }

    /// Like [`toggle_favorite`](Self::toggle_favorite), calling `publish`
    /// with the persisted list before the next toggle can start.
    ///
    /// Mirrors updated through `publish` therefore see toggles in the order
    /// they were written.
    #[instrument(
        skip(self, chapter, verse, publish),
        fields(chapter_id = chapter.id, verse_id = verse.id)
    )]
    pub async fn toggle_favorite_with<F>(
        &self,
        chapter: &Chapter,
        verse: &Verse,
        publish: F,
    ) -> Result<Vec<Favorite>>
    where
        F: FnOnce(&[Favorite]) + Send,
    {
        let _guard = self.favorites_lock.lock().await;

        let mut favorites = self.favorites().await?;
        let before = favorites.len();
        favorites.retain(|favorite| !favorite.matches(chapter.id, verse.id));

        if favorites.len() == before {
            favorites.push(Favorite::from_verse(chapter, verse));
            debug!("Favorite added");
        } else {
            debug!("Favorite removed");
        }

        self.write_json(keys::FAVORITES, &favorites).await?;
        publish(&favorites);
        Ok(favorites)
    }

    pub async fn is_favorite(&self, chapter_id: u32, verse_id: u32) -> Result<bool> {
        Ok(self
            .favorites()
            .await?
            .iter()
            .any(|favorite| favorite.matches(chapter_id, verse_id)))
    }

    // =========================================================================
    // Last read
    // =========================================================================

    /// Overwrite the last-read marker, stamped with the current time.
    #[instrument(skip(self, name_en, name_ar))]
    pub async fn save_last_read(
        &self,
        chapter_id: u32,
        verse_id: u32,
        verse_number: u32,
        name_en: &str,
        name_ar: &str,
    ) -> Result<LastRead> {
        let marker = LastRead {
            chapter_id,
            verse_id,
            verse_number,
            name_en: name_en.to_string(),
            name_ar: name_ar.to_string(),
            timestamp: self.clock.unix_timestamp_millis(),
        };

        self.write_json(keys::LAST_READ, &marker).await?;
        Ok(marker)
    }

    pub async fn last_read(&self) -> Result<Option<LastRead>> {
        self.read_json(keys::LAST_READ).await
    }

    // =========================================================================
    // Reciter, theme, font, translation
    // =========================================================================

    pub async fn active_reciter(&self) -> Result<Reciter> {
        let stored = self.read_json::<Reciter>(keys::ACTIVE_RECITER).await?;
        Ok(match stored {
            Some(reciter) if reciter.validate().is_ok() => reciter,
            Some(reciter) => {
                warn!(reciter = %reciter.id, "Stored reciter is invalid, using default");
                default_reciter()
            }
            None => default_reciter(),
        })
    }

    pub async fn set_active_reciter(&self, reciter: &Reciter) -> Result<()> {
        reciter
            .validate()
            .map_err(|message| LibraryError::invalid_input("reciter", message))?;
        self.write_json(keys::ACTIVE_RECITER, reciter).await
    }

    pub async fn theme_mode(&self) -> Result<ThemeMode> {
        let raw = self.store.get_string(keys::THEME_MODE).await?;
        Ok(match raw {
            Some(raw) => raw.parse::<ThemeMode>().unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring stored theme mode");
                ThemeMode::default()
            }),
            None => ThemeMode::default(),
        })
    }

    pub async fn set_theme_mode(&self, mode: ThemeMode) -> Result<()> {
        self.store
            .set_string(keys::THEME_MODE, mode.as_str())
            .await?;
        Ok(())
    }

    pub async fn font_size(&self) -> Result<u32> {
        let raw = self.store.get_string(keys::FONT_SIZE).await?;
        Ok(match raw {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(size) => clamp_font_size(size),
                Err(_) => {
                    warn!(value = %raw, "Ignoring stored font size");
                    DEFAULT_FONT_SIZE
                }
            },
            None => DEFAULT_FONT_SIZE,
        })
    }

    /// Persist the font size after clamping it.
    ///
    /// # Returns
    /// The size actually stored.
    pub async fn set_font_size(&self, size: u32) -> Result<u32> {
        let size = clamp_font_size(size);
        self.store
            .set_string(keys::FONT_SIZE, &size.to_string())
            .await?;
        Ok(size)
    }

    pub async fn show_translation(&self) -> Result<bool> {
        let raw = self.store.get_string(keys::SHOW_TRANSLATION).await?;
        Ok(match raw.as_deref() {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => {
                warn!(value = %other, "Ignoring stored translation toggle");
                false
            }
        })
    }

    pub async fn set_show_translation(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "true" } else { "false" };
        self.store
            .set_string(keys::SHOW_TRANSLATION, value)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get_string(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Ignoring malformed stored value");
                Ok(None)
            }
        }
    }

    async fn write_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.store.set_string(key, &json).await?;
        Ok(())
    }
}
