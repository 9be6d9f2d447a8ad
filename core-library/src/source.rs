//! Content provider contract.
//!
//! A [`ChapterSource`] turns a chapter id into an ordered, validated
//! [`Chapter`]. Implementations may serve from a cache transparently, so
//! callers can resolve the same id as often as they like.

use crate::error::Result;
use crate::models::Chapter;
use bridge_traits::platform::PlatformSendSync;

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait ChapterSource: PlatformSendSync {
    /// Resolve a chapter with all of its verses.
    ///
    /// # Errors
    /// Returns `LibraryError::ContentUnavailable` if:
    /// - The id is outside the valid chapter range
    /// - The upstream fetch fails
    /// - The upstream payload is malformed
    async fn resolve_chapter(&self, chapter_id: u32) -> Result<Chapter>;

    /// Make sure the chapter is available offline without returning it.
    ///
    /// # Returns
    /// - `Ok(true)` if content had to be fetched
    /// - `Ok(false)` if it was already cached
    async fn cache_chapter(&self, chapter_id: u32) -> Result<bool> {
        self.resolve_chapter(chapter_id).await?;
        Ok(true)
    }
}
