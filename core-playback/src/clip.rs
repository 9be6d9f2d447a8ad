//! # Clip Handle
//!
//! Owns exactly one clip loaded through the platform [`ClipPlayer`].
//!
//! All transport calls on a handle are serialized by an async lock, so a
//! `release` racing an `attach` or `play` always wins cleanly: whichever runs
//! second sees the final state. Once released, every transport call is a
//! no-op.

use crate::error::{PlaybackError, Result};
use bridge_traits::playback::{ClipId, ClipPlayer, ClipSource, ClipStatus, ClipStatusSink};
use core_runtime::logging::strip_path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

#[derive(Debug, Default)]
struct ClipState {
    loaded: bool,
    attached: bool,
    released: bool,
    position_ms: u64,
    duration_ms: u64,
    is_playing: bool,
}

pub struct ClipHandle {
    player: Arc<dyn ClipPlayer>,
    source: ClipSource,
    id: OnceLock<ClipId>,
    state: Mutex<ClipState>,
}

impl ClipHandle {
    /// Create an unloaded handle for `url`.
    pub fn new(player: Arc<dyn ClipPlayer>, url: impl Into<String>) -> Self {
        Self {
            player,
            source: ClipSource::remote(url),
            id: OnceLock::new(),
            state: Mutex::new(ClipState::default()),
        }
    }

    /// Create and load a handle in one step.
    ///
    /// On failure nothing stays allocated and no handle is returned.
    pub async fn open(player: Arc<dyn ClipPlayer>, url: impl Into<String>) -> Result<Arc<Self>> {
        let handle = Arc::new(Self::new(player, url));
        handle.load().await?;
        Ok(handle)
    }

    pub fn url(&self) -> &str {
        &self.source.url
    }

    /// Player id, once loaded.
    pub fn clip_id(&self) -> Option<ClipId> {
        self.id.get().copied()
    }

    /// Acquire the clip. Does not start playback.
    ///
    /// # Errors
    /// `ResourceUnavailable` if the player cannot fetch or decode the clip, or
    /// if the handle was released.
    #[instrument(skip(self), fields(clip = %strip_path(&self.source.url)))]
    pub async fn load(&self) -> Result<ClipId> {
        let mut state = self.state.lock().await;
        if state.released {
            return Err(PlaybackError::resource_unavailable(
                self.url(),
                "handle already released",
            ));
        }
        if let Some(id) = self.clip_id() {
            return Ok(id);
        }

        let id = self
            .player
            .load(self.source.clone())
            .await
            .map_err(|e| PlaybackError::resource_unavailable(self.url(), e))?;

        if self.id.set(id).is_err() {
            let _ = self.player.unload(id).await;
            return Err(PlaybackError::Internal(format!(
                "clip {} loaded twice",
                self.url()
            )));
        }
        state.loaded = true;
        debug!(clip_id = %id, "Clip loaded");
        Ok(id)
    }

    pub async fn play(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(id) = self.usable(&state) else {
            return Ok(());
        };
        self.player.play(id).await?;
        state.is_playing = true;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(id) = self.usable(&state) else {
            return Ok(());
        };
        self.player.pause(id).await?;
        state.is_playing = false;
        Ok(())
    }

    /// Move the cursor, clamped to `[0, duration]` once the duration is known.
    ///
    /// # Returns
    /// The position actually requested from the player.
    pub async fn seek(&self, position_ms: u64) -> Result<u64> {
        let mut state = self.state.lock().await;
        let Some(id) = self.usable(&state) else {
            return Ok(0);
        };

        let target = if state.duration_ms > 0 {
            position_ms.min(state.duration_ms)
        } else {
            position_ms
        };

        self.player
            .seek(id, Duration::from_millis(target))
            .await?;
        state.position_ms = target;
        Ok(target)
    }

    /// Route status updates for this clip to `sink`. Idempotent.
    pub async fn attach(&self, sink: Arc<dyn ClipStatusSink>) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(id) = self.usable(&state) else {
            return Ok(());
        };
        if state.attached {
            return Ok(());
        }
        self.player.attach_status(id, sink).await?;
        state.attached = true;
        Ok(())
    }

    /// Stop status delivery. Idempotent.
    pub async fn detach(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.detach_locked(&mut state).await
    }

    /// Detach, stop and unload. Safe to call repeatedly and on a handle that
    /// never loaded.
    ///
    /// # Returns
    /// `true` only for the call that actually released the handle.
    #[instrument(skip(self), fields(clip = %strip_path(&self.source.url)))]
    pub async fn release(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.released {
            return false;
        }
        state.released = true;

        if let Err(e) = self.detach_locked(&mut state).await {
            warn!(error = %e, "Failed to detach clip status");
        }

        if let Some(id) = self.clip_id().filter(|_| state.loaded) {
            if state.is_playing {
                if let Err(e) = self.player.stop(id).await {
                    warn!(clip_id = %id, error = %e, "Failed to stop clip");
                }
            }
            if let Err(e) = self.player.unload(id).await {
                warn!(clip_id = %id, error = %e, "Failed to unload clip");
            }
            debug!(clip_id = %id, "Clip released");
        }

        state.loaded = false;
        state.is_playing = false;
        true
    }

    /// Record the latest status reported by the platform media clock.
    pub async fn record_status(&self, status: &ClipStatus) {
        let mut state = self.state.lock().await;
        if !status.is_loaded || state.released {
            return;
        }
        state.position_ms = status.position_ms;
        if status.duration_ms > 0 {
            state.duration_ms = status.duration_ms;
        }
        state.is_playing = status.is_playing;
    }

    pub async fn is_loaded(&self) -> bool {
        let state = self.state.lock().await;
        state.loaded && !state.released
    }

    pub async fn is_released(&self) -> bool {
        self.state.lock().await.released
    }

    pub async fn position_ms(&self) -> u64 {
        self.state.lock().await.position_ms
    }

    pub async fn duration_ms(&self) -> u64 {
        self.state.lock().await.duration_ms
    }

    fn usable(&self, state: &ClipState) -> Option<ClipId> {
        if state.released || !state.loaded {
            debug!(clip = %strip_path(&self.source.url), "Ignoring transport call on unloaded clip");
            return None;
        }
        self.clip_id()
    }

    async fn detach_locked(&self, state: &mut ClipState) -> Result<()> {
        if !state.attached {
            return Ok(());
        }
        state.attached = false;
        if let Some(id) = self.clip_id() {
            self.player.detach_status(id).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ClipHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipHandle")
            .field("url", &self.source.url)
            .field("clip_id", &self.clip_id())
            .finish()
    }
}

impl Drop for ClipHandle {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.released || !state.loaded {
            return;
        }
        let attached = state.attached;
        let Some(id) = self.id.get().copied() else {
            return;
        };

        warn!(clip_id = %id, clip = %strip_path(&self.source.url), "Clip dropped without release");

        // Best effort: the player still owns decoder resources for this id
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let player = Arc::clone(&self.player);
            runtime.spawn(async move {
                if attached {
                    let _ = player.detach_status(id).await;
                }
                let _ = player.unload(id).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::{mock, Sequence};

    mock! {
        Player {}

        #[async_trait::async_trait]
        impl ClipPlayer for Player {
            async fn load(&self, source: ClipSource) -> BridgeResult<ClipId>;
            async fn play(&self, clip: ClipId) -> BridgeResult<()>;
            async fn pause(&self, clip: ClipId) -> BridgeResult<()>;
            async fn stop(&self, clip: ClipId) -> BridgeResult<()>;
            async fn seek(&self, clip: ClipId, position: Duration) -> BridgeResult<()>;
            async fn unload(&self, clip: ClipId) -> BridgeResult<()>;
            async fn attach_status(&self, clip: ClipId, sink: Arc<dyn ClipStatusSink>) -> BridgeResult<()>;
            async fn detach_status(&self, clip: ClipId) -> BridgeResult<()>;
        }
    }

    struct NullSink;

    impl ClipStatusSink for NullSink {
        fn on_status(&self, _clip: ClipId, _status: ClipStatus) {}
    }

    const URL: &str = "https://everyayah.com/data/Alafasy_128kbps/001001.mp3";

    #[tokio::test]
    async fn test_release_detaches_before_unload() {
        let id = ClipId::new();
        let mut player = MockPlayer::new();
        let mut seq = Sequence::new();

        player
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |source| {
                assert_eq!(source.url, URL);
                Ok(id)
            });
        player
            .expect_attach_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        player
            .expect_play()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        player
            .expect_detach_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        player
            .expect_stop()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        player
            .expect_unload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let handle = ClipHandle::open(Arc::new(player), URL).await.unwrap();
        handle.attach(Arc::new(NullSink)).await.unwrap();
        handle.attach(Arc::new(NullSink)).await.unwrap();
        handle.play().await.unwrap();

        assert!(handle.release().await);
        assert!(!handle.release().await);
        assert!(handle.is_released().await);
    }

    #[tokio::test]
    async fn test_release_never_loaded_handle() {
        let handle = ClipHandle::new(Arc::new(MockPlayer::new()), URL);
        assert!(handle.release().await);
        assert!(!handle.release().await);
        assert!(handle.load().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_load_is_resource_unavailable() {
        let mut player = MockPlayer::new();
        player
            .expect_load()
            .returning(|_| Err(BridgeError::OperationFailed("404".into())));

        let err = ClipHandle::open(Arc::new(player), URL).await.unwrap_err();
        assert!(matches!(err, PlaybackError::ResourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_transport_after_release_is_noop() {
        let id = ClipId::new();
        let mut player = MockPlayer::new();
        player.expect_load().returning(move |_| Ok(id));
        player.expect_unload().times(1).returning(|_| Ok(()));
        player.expect_play().times(0);
        player.expect_seek().times(0);

        let handle = ClipHandle::open(Arc::new(player), URL).await.unwrap();
        handle.release().await;

        handle.play().await.unwrap();
        handle.pause().await.unwrap();
        assert_eq!(handle.seek(1_000).await.unwrap(), 0);
        handle.attach(Arc::new(NullSink)).await.unwrap();
    }

    #[tokio::test]
    async fn test_seek_clamps_to_duration() {
        let id = ClipId::new();
        let mut player = MockPlayer::new();
        player.expect_load().returning(move |_| Ok(id));
        player
            .expect_seek()
            .withf(|_, position| *position == Duration::from_millis(4_000))
            .times(1)
            .returning(|_, _| Ok(()));
        player.expect_unload().returning(|_| Ok(()));

        let handle = ClipHandle::open(Arc::new(player), URL).await.unwrap();
        handle
            .record_status(&ClipStatus::loaded(500, 4_000, false))
            .await;

        assert_eq!(handle.seek(9_999).await.unwrap(), 4_000);
        assert_eq!(handle.duration_ms().await, 4_000);
        handle.release().await;
    }
}
