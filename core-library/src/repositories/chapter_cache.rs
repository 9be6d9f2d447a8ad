//! Read-through chapter cache
//!
//! Resolved chapters are written to the settings store under
//! `cache_surah_{id}` so they stay readable offline, and the most recent ones
//! are also kept in memory.

use crate::error::{LibraryError, Result};
use crate::models::{is_valid_chapter_id, Chapter};
use crate::source::ChapterSource;
use bridge_traits::storage::SettingsStore;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Chapters kept in memory by default.
pub const DEFAULT_MEMORY_CAPACITY: usize = 8;

pub fn chapter_cache_key(chapter_id: u32) -> String {
    format!("cache_surah_{}", chapter_id)
}

/// Caches chapters resolved by `S` in memory and in the settings store.
pub struct CachedChapterSource<S> {
    upstream: S,
    store: Arc<dyn SettingsStore>,
    memory: Mutex<LruCache<u32, Arc<Chapter>>>,
}

impl<S: ChapterSource> CachedChapterSource<S> {
    pub fn new(upstream: S, store: Arc<dyn SettingsStore>) -> Self {
        Self::with_capacity(upstream, store, DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(upstream: S, store: Arc<dyn SettingsStore>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            upstream,
            store,
            memory: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn upstream(&self) -> &S {
        &self.upstream
    }

    /// Drop a chapter from both cache layers.
    pub async fn evict(&self, chapter_id: u32) -> Result<()> {
        self.memory.lock().pop(&chapter_id);
        self.store.delete(&chapter_cache_key(chapter_id)).await?;
        Ok(())
    }

    fn from_memory(&self, chapter_id: u32) -> Option<Arc<Chapter>> {
        self.memory.lock().get(&chapter_id).cloned()
    }

    fn remember(&self, chapter: Arc<Chapter>) {
        self.memory.lock().put(chapter.id, chapter);
    }

    /// Read the persisted copy. Unreadable entries are removed so the next
    /// resolve goes upstream.
    async fn from_store(&self, chapter_id: u32) -> Option<Arc<Chapter>> {
        let key = chapter_cache_key(chapter_id);

        let raw = match self.store.get_string(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(chapter_id, error = %e, "Chapter cache read failed");
                return None;
            }
        };

        let parsed = serde_json::from_str::<Chapter>(&raw)
            .map_err(|e| e.to_string())
            .and_then(|chapter| {
                chapter.validate()?;
                if chapter.id != chapter_id {
                    return Err(format!("stored under {} but has id {}", chapter_id, chapter.id));
                }
                Ok(chapter)
            });

        match parsed {
            Ok(chapter) => Some(Arc::new(chapter)),
            Err(reason) => {
                warn!(chapter_id, reason = %reason, "Discarding corrupt cached chapter");
                if let Err(e) = self.store.delete(&key).await {
                    warn!(chapter_id, error = %e, "Failed to delete corrupt cache entry");
                }
                None
            }
        }
    }

    async fn fetch_and_store(&self, chapter_id: u32) -> Result<Arc<Chapter>> {
        let chapter = self.upstream.resolve_chapter(chapter_id).await?;
        chapter
            .validate()
            .map_err(|reason| LibraryError::content_unavailable(chapter_id, reason))?;

        // A failed write only costs a refetch later
        match serde_json::to_string(&chapter) {
            Ok(json) => {
                if let Err(e) = self
                    .store
                    .set_string(&chapter_cache_key(chapter_id), &json)
                    .await
                {
                    warn!(chapter_id, error = %e, "Failed to persist chapter cache");
                }
            }
            Err(e) => warn!(chapter_id, error = %e, "Failed to encode chapter for cache"),
        }

        let chapter = Arc::new(chapter);
        self.remember(Arc::clone(&chapter));
        Ok(chapter)
    }

    fn check_id(chapter_id: u32) -> Result<()> {
        if is_valid_chapter_id(chapter_id) {
            Ok(())
        } else {
            Err(LibraryError::content_unavailable(
                chapter_id,
                "chapter id out of range",
            ))
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl<S: ChapterSource> ChapterSource for CachedChapterSource<S> {
    #[instrument(skip(self))]
    async fn resolve_chapter(&self, chapter_id: u32) -> Result<Chapter> {
        Self::check_id(chapter_id)?;

        if let Some(chapter) = self.from_memory(chapter_id) {
            debug!(chapter_id, "Chapter served from memory");
            return Ok(chapter.as_ref().clone());
        }

        if let Some(chapter) = self.from_store(chapter_id).await {
            debug!(chapter_id, "Chapter served from settings cache");
            self.remember(Arc::clone(&chapter));
            return Ok(chapter.as_ref().clone());
        }

        let chapter = self.fetch_and_store(chapter_id).await?;
        Ok(chapter.as_ref().clone())
    }

    #[instrument(skip(self))]
    async fn cache_chapter(&self, chapter_id: u32) -> Result<bool> {
        Self::check_id(chapter_id)?;

        if self.from_memory(chapter_id).is_some() {
            return Ok(false);
        }
        if let Some(chapter) = self.from_store(chapter_id).await {
            self.remember(chapter);
            return Ok(false);
        }

        self.fetch_and_store(chapter_id).await?;
        Ok(true)
    }
}
