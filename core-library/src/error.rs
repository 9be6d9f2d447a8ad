use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Chapter {chapter_id} unavailable: {reason}")]
    ContentUnavailable { chapter_id: u32, reason: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LibraryError {
    pub fn content_unavailable(chapter_id: u32, reason: impl Into<String>) -> Self {
        Self::ContentUnavailable {
            chapter_id,
            reason: reason.into(),
        }
    }

    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LibraryError::Bridge(_) | LibraryError::ContentUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
