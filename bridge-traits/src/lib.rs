//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the
//! recitation core.
//!
//! ## Traits
//!
//! ### Audio
//! - [`ClipPlayer`](playback::ClipPlayer) - Load, drive and dispose of per-verse audio clips
//!
//! ### Networking & Storage
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry policy
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Platform Integration
//! - [`BackgroundExecutor`](background::BackgroundExecutor) - Recurring task scheduling
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Audio |
//! |----------|---------------------|-------|
//! | Desktop  | `bridge-desktop`    | host supplied |
//! | iOS      | host app            | AVPlayer |
//! | Android  | host app            | ExoPlayer |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability is
//! missing:
//!
//! ```ignore
//! let clip_player = config.clip_player
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "ClipPlayer".to_string(),
//!         message: "Inject the platform audio adapter.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with an actionable message.
//!
//! ## Thread Safety
//!
//! On native targets every bridge trait requires `Send + Sync` so a single
//! implementation can be shared across async tasks.

pub mod background;
pub mod error;
pub mod http;
pub mod platform;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{BackgroundExecutor, TaskConstraints, TaskId, TaskStatus};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{ClipId, ClipPlayer, ClipSource, ClipStatus, ClipStatusSink};
pub use storage::SettingsStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
