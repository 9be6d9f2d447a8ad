//! # Core Configuration Module
//!
//! Provides configuration management for the recitation core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings for the core
//! library. It enforces fail-fast validation so a missing bridge surfaces at
//! startup, not halfway through a chapter.
//!
//! ## Required Dependencies
//!
//! - `ClipPlayer` - Platform audio adapter (no default on any platform)
//! - `SettingsStore` - User preferences and chapter cache
//! - `HttpClient` - Chapter content fetches
//!
//! ## Optional Dependencies
//!
//! - `BackgroundExecutor` - Periodic chapter prefetch
//! - `Clock` - Time source for last-read timestamps (defaults to `SystemClock`)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `SettingsStore` and `HttpClient` are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlaybackPolicy};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .clip_player(Arc::new(MyClipPlayer))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .http_client(Arc::new(MyHttpClient))
//!     .playback_policy(PlaybackPolicy {
//!         auto_advance_chapter: true,
//!         ..Default::default()
//!     })
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No ClipPlayer was injected
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{BackgroundExecutor, ClipPlayer, Clock, HttpClient, SettingsStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Highest chapter id in the corpus.
pub const MAX_CHAPTER_ID: u32 = 114;

/// Core configuration for the recitation core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Platform audio adapter (required)
    pub clip_player: Arc<dyn ClipPlayer>,

    /// User preferences and cache storage (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// HTTP client for content fetches (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Background task executor (optional)
    pub background_executor: Option<Arc<dyn BackgroundExecutor>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Playback behaviour knobs
    pub playback: PlaybackPolicy,

    /// Content endpoints and editions
    pub content: ContentConfig,

    /// Background chapter prefetch
    pub prefetch: PrefetchConfig,

    /// Schedule the prefetch task on bootstrap (requires BackgroundExecutor)
    pub enable_background_prefetch: bool,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("clip_player", &"ClipPlayer { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("http_client", &"HttpClient { ... }")
            .field(
                "background_executor",
                &self
                    .background_executor
                    .as_ref()
                    .map(|_| "BackgroundExecutor { ... }"),
            )
            .field("playback", &self.playback)
            .field("content", &self.content)
            .field("prefetch", &self.prefetch)
            .field("enable_background_prefetch", &self.enable_background_prefetch)
            .finish()
    }
}

/// Playback behaviour that is product policy rather than mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPolicy {
    /// Continue with the next chapter when the last verse finishes
    pub auto_advance_chapter: bool,

    /// Pause between the end of one chapter and the start of the next
    pub chapter_advance_delay: Duration,

    /// Keep the neighbouring verses loaded for gapless skips
    pub preload_adjacent: bool,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self {
            auto_advance_chapter: false,
            chapter_advance_delay: Duration::from_millis(500),
            preload_adjacent: true,
        }
    }
}

/// Remote content endpoints.
///
/// # Example
///
/// ```
/// use core_runtime::config::ContentConfig;
///
/// let content = ContentConfig::default().without_translation();
/// assert!(content.translation_edition.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentConfig {
    /// Base URL of the chapter text API
    pub api_base_url: String,

    /// Edition used for the verse text
    pub text_edition: String,

    /// Edition merged in as the verse translation, if any
    pub translation_edition: Option<String>,

    /// Base URL of the per-verse recitation files
    pub audio_base_url: String,

    /// Timeout applied to each content request
    pub request_timeout: Duration,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.alquran.cloud/v1".to_string(),
            text_edition: "ar.alafasy".to_string(),
            translation_edition: Some("en.sahih".to_string()),
            audio_base_url: "https://everyayah.com/data".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ContentConfig {
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_audio_base_url(mut self, url: impl Into<String>) -> Self {
        self.audio_base_url = url.into();
        self
    }

    pub fn with_translation_edition(mut self, edition: impl Into<String>) -> Self {
        self.translation_edition = Some(edition.into());
        self
    }

    pub fn without_translation(mut self) -> Self {
        self.translation_edition = None;
        self
    }

    /// Validates the content endpoints
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(Error::Config("Content API base URL cannot be empty".to_string()));
        }

        if self.audio_base_url.trim().is_empty() {
            return Err(Error::Config("Audio base URL cannot be empty".to_string()));
        }

        if self.text_edition.trim().is_empty() {
            return Err(Error::Config("Text edition cannot be empty".to_string()));
        }

        if matches!(&self.translation_edition, Some(edition) if edition.trim().is_empty()) {
            return Err(Error::Config(
                "Translation edition cannot be empty; use without_translation() instead"
                    .to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Background chapter prefetch cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchConfig {
    pub interval: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Content endpoints and timeouts are usable
    /// - The prefetch interval is non-zero
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        self.content.validate()?;

        if self.prefetch.interval.is_zero() {
            return Err(Error::Config(
                "Prefetch interval must be greater than 0".to_string(),
            ));
        }

        if self.enable_background_prefetch && self.background_executor.is_none() {
            return Err(Error::Config(
                "Background prefetch enabled but no BackgroundExecutor provided. \
                 Disable the feature or inject a BackgroundExecutor implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn clip_player_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "ClipPlayer".to_string(),
        message: "ClipPlayer implementation is required for verse audio. \
                 Mobile: inject an AVPlayer/ExoPlayer backed adapter. \
                 Desktop: inject the host's audio output adapter."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for user preferences. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore)."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for chapter content. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject URLSession/OkHttp backed clients."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let path = path
        .or_else(SqliteSettingsStore::default_path)
        .ok_or_else(|| {
            Error::Config(
                "No data directory available for the default settings store. \
                 Use .settings_path() to set it."
                    .to_string(),
            )
        })?;

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Builder::new_current_thread().enable_all().build().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a runtime, so hop to a plain thread in that case
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to initialize default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    clip_player: Option<Arc<dyn ClipPlayer>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    background_executor: Option<Arc<dyn BackgroundExecutor>>,
    clock: Option<Arc<dyn Clock>>,
    playback: PlaybackPolicy,
    content: ContentConfig,
    prefetch: PrefetchConfig,
    enable_background_prefetch: bool,
}

impl CoreConfigBuilder {
    /// Sets the platform audio adapter (required).
    pub fn clip_player(mut self, player: Arc<dyn ClipPlayer>) -> Self {
        self.clip_player = Some(player);
        self
    }

    /// Sets the settings store implementation.
    ///
    /// If not provided, the desktop default (SQLite) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Location of the default desktop settings database.
    ///
    /// Ignored when a settings store is injected.
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) is used when the
    /// `desktop-shims` feature is enabled.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use core_runtime::config::CoreConfig;
    /// use std::sync::Arc;
    /// # use bridge_traits::HttpClient;
    /// # struct MyHttpClient;
    /// # #[async_trait::async_trait]
    /// # impl HttpClient for MyHttpClient {
    /// #     async fn execute(&self, request: bridge_traits::HttpRequest) -> Result<bridge_traits::HttpResponse, bridge_traits::BridgeError> { unimplemented!() }
    /// # }
    ///
    /// let builder = CoreConfig::builder()
    ///     .http_client(Arc::new(MyHttpClient));
    /// ```
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the background executor implementation (optional).
    pub fn background_executor(mut self, executor: Arc<dyn BackgroundExecutor>) -> Self {
        self.background_executor = Some(executor);
        self
    }

    /// Sets the time source (defaults to the system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn playback_policy(mut self, policy: PlaybackPolicy) -> Self {
        self.playback = policy;
        self
    }

    /// Shorthand for toggling [`PlaybackPolicy::auto_advance_chapter`].
    pub fn auto_advance_chapter(mut self, enabled: bool) -> Self {
        self.playback.auto_advance_chapter = enabled;
        self
    }

    pub fn content(mut self, content: ContentConfig) -> Self {
        self.content = content;
        self
    }

    pub fn prefetch(mut self, prefetch: PrefetchConfig) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Enables or disables the recurring chapter prefetch.
    ///
    /// Requires a `BackgroundExecutor` to be provided.
    ///
    /// Default: false
    pub fn enable_background_prefetch(mut self, enabled: bool) -> Self {
        self.enable_background_prefetch = enabled;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - Required bridges are missing (ClipPlayer, and SettingsStore/HttpClient
    ///   without `desktop-shims`)
    /// - Configuration values are invalid
    /// - Feature flags are inconsistent with available bridges
    pub fn build(self) -> Result<CoreConfig> {
        let clip_player = self.clip_player.ok_or_else(clip_player_missing_error)?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_path)?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(self.content.request_timeout)?,
        };

        let config = CoreConfig {
            clip_player,
            settings_store,
            http_client,
            background_executor: self.background_executor,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            playback: self.playback,
            content: self.content,
            prefetch: self.prefetch,
            enable_background_prefetch: self.enable_background_prefetch,
        };

        config.validate()?;

        Ok(config)
    }
}
