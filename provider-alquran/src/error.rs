//! Error types for the alquran.cloud provider

use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Chapter id outside the valid range; no request was made
    #[error("Invalid chapter id: {0}")]
    InvalidChapter(u32),

    /// API answered with a non-success status
    #[error("alquran.cloud API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Every provider failure surfaces to callers as missing content.
    pub fn into_library_error(self, chapter_id: u32) -> LibraryError {
        LibraryError::content_unavailable(chapter_id, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ProviderError::ApiError {
            status_code: 404,
            message: "NOT FOUND".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "alquran.cloud API error (status 404): NOT FOUND"
        );
    }

    #[test]
    fn test_conversion_to_content_unavailable() {
        let error = ProviderError::Malformed("missing ayahs".to_string());
        match error.into_library_error(3) {
            LibraryError::ContentUnavailable { chapter_id, reason } => {
                assert_eq!(chapter_id, 3);
                assert!(reason.contains("missing ayahs"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
