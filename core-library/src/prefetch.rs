//! Sequential offline prefetch
//!
//! Each step caches the chapter after the persisted cursor, so repeated runs
//! walk the whole book once and then report [`PrefetchOutcome::Complete`].

use crate::error::Result;
use crate::models::LAST_CHAPTER_ID;
use crate::source::ChapterSource;
use bridge_traits::storage::SettingsStore;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Settings key holding the id of the last chapter prefetched.
pub const PREFETCH_CURSOR_KEY: &str = "last_bg_download_id";

/// Result of one prefetch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// The chapter is now cached and the cursor moved to it.
    Cached(u32),
    /// Caching failed; the cursor did not move and the chapter is retried next time.
    Failed(u32),
    /// Every chapter has been prefetched.
    Complete,
}

pub struct ChapterPrefetcher {
    source: Arc<dyn ChapterSource>,
    store: Arc<dyn SettingsStore>,
}

impl ChapterPrefetcher {
    pub fn new(source: Arc<dyn ChapterSource>, store: Arc<dyn SettingsStore>) -> Self {
        Self { source, store }
    }

    /// Id of the last chapter cached by a previous step, 0 if none.
    pub async fn cursor(&self) -> Result<u32> {
        let raw = self.store.get_string(PREFETCH_CURSOR_KEY).await?;
        Ok(match raw {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Resetting unreadable prefetch cursor");
                0
            }),
            None => 0,
        })
    }

    /// Cache the next chapter after the cursor.
    ///
    /// # Errors
    /// Only settings store failures are returned; content failures are
    /// reported as [`PrefetchOutcome::Failed`].
    #[instrument(skip(self))]
    pub async fn step(&self) -> Result<PrefetchOutcome> {
        let next = self.cursor().await?.saturating_add(1);
        if next > LAST_CHAPTER_ID {
            return Ok(PrefetchOutcome::Complete);
        }

        match self.source.cache_chapter(next).await {
            Ok(fetched) => {
                self.store
                    .set_string(PREFETCH_CURSOR_KEY, &next.to_string())
                    .await?;
                info!(chapter_id = next, fetched, "Prefetched chapter");
                Ok(PrefetchOutcome::Cached(next))
            }
            Err(e) => {
                warn!(chapter_id = next, error = %e, "Prefetch failed");
                Ok(PrefetchOutcome::Failed(next))
            }
        }
    }
}
