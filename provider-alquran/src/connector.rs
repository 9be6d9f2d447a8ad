//! alquran.cloud API connector
//!
//! Implements `ChapterSource` over the public REST API. The text edition is
//! required; the translation edition is merged in on a best-effort basis.

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use core_library::error::Result as LibraryResult;
use core_library::models::{is_valid_chapter_id, Chapter, Verse};
use core_library::source::ChapterSource;
use core_runtime::config::ContentConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{ProviderError, Result};
use crate::types::{ApiEnvelope, SurahEdition};

/// alquran.cloud connector
///
/// # Features
///
/// - Shape validation of every response before it reaches playback
/// - Retry with exponential backoff on 429/5xx via the host `HttpClient`
/// - Translation fetched alongside the text and merged by position
///
/// # Example
///
/// ```ignore
/// use provider_alquran::AlQuranProvider;
/// use core_library::ChapterSource;
///
/// let provider = AlQuranProvider::from_config(http_client, &ContentConfig::default());
/// let chapter = provider.resolve_chapter(1).await?;
/// ```
pub struct AlQuranProvider {
    http_client: Arc<dyn HttpClient>,
    api_base_url: String,
    text_edition: String,
    translation_edition: Option<String>,
    request_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl AlQuranProvider {
    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &ContentConfig) -> Self {
        Self {
            http_client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            text_edition: config.text_edition.clone(),
            translation_edition: config.translation_edition.clone(),
            request_timeout: config.request_timeout,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn edition_url(&self, chapter_id: u32, edition: &str) -> String {
        format!("{}/surah/{}/{}", self.api_base_url, chapter_id, edition)
    }

    /// Fetch one chapter in one edition and check the envelope.
    #[instrument(skip(self))]
    async fn fetch_edition(&self, chapter_id: u32, edition: &str) -> Result<SurahEdition> {
        let request = HttpRequest::get(self.edition_url(chapter_id, edition))
            .accept_json()
            .timeout(self.request_timeout);

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        Self::parse_edition(chapter_id, &response)
    }

    fn parse_edition(chapter_id: u32, response: &HttpResponse) -> Result<SurahEdition> {
        if !response.is_success() {
            return Err(ProviderError::ApiError {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        let envelope: ApiEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| ProviderError::Malformed(format!("Invalid envelope: {}", e)))?;

        if envelope.code != 200 {
            return Err(ProviderError::ApiError {
                status_code: envelope.code,
                message: envelope.status,
            });
        }

        let edition: SurahEdition = serde_json::from_value(envelope.data)
            .map_err(|e| ProviderError::Malformed(format!("Invalid chapter payload: {}", e)))?;

        if edition.number != chapter_id {
            return Err(ProviderError::Malformed(format!(
                "Requested chapter {} but received {}",
                chapter_id, edition.number
            )));
        }

        if edition.ayahs.is_empty() {
            return Err(ProviderError::Malformed("Chapter has no verses".to_string()));
        }

        Ok(edition)
    }

    fn to_chapter(edition: SurahEdition) -> Chapter {
        Chapter {
            id: edition.number,
            name_ar: edition.name,
            name_en: edition.english_name,
            verses: edition
                .ayahs
                .into_iter()
                .map(|ayah| Verse {
                    id: ayah.number,
                    number_in_chapter: ayah.number_in_surah,
                    text: ayah.text,
                    translation: None,
                    audio_url: ayah.audio,
                })
                .collect(),
        }
    }

    /// Copy translation texts onto the verses when both editions line up.
    fn merge_translation(chapter: &mut Chapter, translation: Result<SurahEdition>) {
        let translation = match translation {
            Ok(edition) => edition,
            Err(e) => {
                warn!(chapter_id = chapter.id, error = %e, "Translation unavailable");
                return;
            }
        };

        if translation.ayahs.len() != chapter.verses.len() {
            warn!(
                chapter_id = chapter.id,
                verses = chapter.verses.len(),
                translated = translation.ayahs.len(),
                "Translation verse count mismatch"
            );
            return;
        }

        for (verse, ayah) in chapter.verses.iter_mut().zip(translation.ayahs) {
            verse.translation = Some(ayah.text);
        }
    }

    async fn resolve(&self, chapter_id: u32) -> Result<Chapter> {
        if !is_valid_chapter_id(chapter_id) {
            return Err(ProviderError::InvalidChapter(chapter_id));
        }

        let text = self.fetch_edition(chapter_id, &self.text_edition);

        let (text, translation) = match self.translation_edition.as_deref() {
            Some(edition) => {
                let (text, translation) =
                    futures::join!(text, self.fetch_edition(chapter_id, edition));
                (text, Some(translation))
            }
            None => (text.await, None),
        };

        let mut chapter = Self::to_chapter(text?);
        chapter.validate().map_err(ProviderError::Malformed)?;

        if let Some(translation) = translation {
            Self::merge_translation(&mut chapter, translation);
        }

        Ok(chapter)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl ChapterSource for AlQuranProvider {
    #[instrument(skip(self))]
    async fn resolve_chapter(&self, chapter_id: u32) -> LibraryResult<Chapter> {
        debug!("Resolving chapter from alquran.cloud");

        let chapter = self
            .resolve(chapter_id)
            .await
            .map_err(|e| e.into_library_error(chapter_id))?;

        info!(verses = chapter.len(), "Resolved chapter");
        Ok(chapter)
    }
}
