//! # Playback Error Types
//!
//! Failure taxonomy of the playback engine.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Recoverable failures
    // ========================================================================
    /// Chapter metadata could not be resolved. The caller may retry.
    #[error("Chapter {chapter_id} unavailable: {reason}")]
    ContentUnavailable { chapter_id: u32, reason: String },

    /// A verse clip failed to load or start.
    #[error("Clip unavailable ({url}): {reason}")]
    ResourceUnavailable { url: String, reason: String },

    // ========================================================================
    // Silently discarded outcomes
    // ========================================================================
    /// A newer operation superseded this one before it completed.
    #[error("Operation {ticket} superseded by {current}")]
    StaleOperation { ticket: u64, current: u64 },

    /// Requested verse index is outside the active chapter.
    #[error("Verse index {index} outside chapter of {len} verses")]
    InvalidIndex { index: usize, len: usize },

    /// A verse load is already in flight for the current session.
    #[error("Playback busy")]
    Busy,

    // ========================================================================
    // Other
    // ========================================================================
    /// The operation needs an active chapter.
    #[error("No chapter loaded")]
    NoChapterLoaded,

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    pub fn content_unavailable(chapter_id: u32, reason: impl ToString) -> Self {
        Self::ContentUnavailable {
            chapter_id,
            reason: reason.to_string(),
        }
    }

    pub fn resource_unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::ResourceUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if re-issuing the operation later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlaybackError::ContentUnavailable { .. }
                | PlaybackError::ResourceUnavailable { .. }
                | PlaybackError::Bridge(_)
                | PlaybackError::Busy
        )
    }

    /// Returns `true` for outcomes the engine logs and swallows instead of
    /// surfacing to callers.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            PlaybackError::StaleOperation { .. }
                | PlaybackError::InvalidIndex { .. }
                | PlaybackError::Busy
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let stale = PlaybackError::StaleOperation {
            ticket: 3,
            current: 4,
        };
        assert!(stale.is_silent());
        assert!(!stale.is_recoverable());

        let invalid = PlaybackError::InvalidIndex { index: 9, len: 7 };
        assert!(invalid.is_silent());

        let content = PlaybackError::content_unavailable(2, "offline");
        assert!(content.is_recoverable());
        assert!(!content.is_silent());
        assert_eq!(content.to_string(), "Chapter 2 unavailable: offline");

        let clip = PlaybackError::resource_unavailable("https://cdn/001001.mp3", "404");
        assert!(clip.is_recoverable());
        assert!(!clip.is_silent());

        assert!(!PlaybackError::NoChapterLoaded.is_recoverable());
    }
}
