//! Clip playback bridge.
//!
//! A clip is one short remote audio resource (a single recited verse). The
//! host owns the actual decoder and output device; the core only asks it to
//! load, drive and dispose of clips by id, and receives status updates through
//! a sink it attaches to exactly one clip at a time.
//!
//! Status delivery is push-style. The platform media clock calls
//! [`ClipStatusSink::on_status`] on its own cadence while a sink is attached.
//! [`ClipPlayer::detach_status`] is awaited by the core before a clip is
//! unloaded; once it returns, the adapter must not deliver further updates
//! for that clip.

use crate::{error::Result, platform::PlatformSendSync};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Identifier of a clip loaded by a [`ClipPlayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(Uuid);

impl ClipId {
    /// Generate a new clip identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a clip's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSource {
    pub url: String,
}

impl ClipSource {
    pub fn remote(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Snapshot reported by the platform media clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClipStatus {
    pub is_loaded: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
    /// Edge-triggered: true in exactly one update per natural end of clip.
    pub did_just_finish: bool,
}

impl ClipStatus {
    /// Status of a loaded clip at `position_ms`.
    pub fn loaded(position_ms: u64, duration_ms: u64, is_playing: bool) -> Self {
        Self {
            is_loaded: true,
            position_ms,
            duration_ms,
            is_playing,
            did_just_finish: false,
        }
    }

    /// The single update emitted when a clip reaches its natural end.
    pub fn finished(duration_ms: u64) -> Self {
        Self {
            is_loaded: true,
            position_ms: duration_ms,
            duration_ms,
            is_playing: false,
            did_just_finish: true,
        }
    }
}

/// Receiver of status updates for an attached clip.
pub trait ClipStatusSink: PlatformSendSync {
    fn on_status(&self, clip: ClipId, status: ClipStatus);
}

/// Platform audio adapter that owns decoders and output for individual clips.
///
/// Every clip returned by [`load`](ClipPlayer::load) is exclusively owned by
/// the caller until [`unload`](ClipPlayer::unload) is called for it.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait ClipPlayer: PlatformSendSync {
    /// Fetch and decode the clip. Must not start playback.
    ///
    /// On failure nothing is left allocated and no id is returned.
    async fn load(&self, source: ClipSource) -> Result<ClipId>;

    /// Begin or resume playback.
    async fn play(&self, clip: ClipId) -> Result<()>;

    /// Pause playback, keeping the position.
    async fn pause(&self, clip: ClipId) -> Result<()>;

    /// Stop playback.
    async fn stop(&self, clip: ClipId) -> Result<()>;

    /// Move the playback cursor to an absolute position.
    async fn seek(&self, clip: ClipId, position: Duration) -> Result<()>;

    /// Release every resource held for the clip.
    async fn unload(&self, clip: ClipId) -> Result<()>;

    /// Start delivering status updates for `clip` to `sink`.
    async fn attach_status(&self, clip: ClipId, sink: Arc<dyn ClipStatusSink>) -> Result<()>;

    /// Stop delivering status updates for `clip`.
    async fn detach_status(&self, clip: ClipId) -> Result<()>;
}
