//! # Engine Configuration

use core_runtime::config::{CoreConfig, PlaybackPolicy};

/// Default archive for per-verse recitation files.
pub const DEFAULT_AUDIO_BASE_URL: &str = "https://everyayah.com/data";

/// Settings the playback engine needs beyond its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Base URL that reciter folders are resolved against.
    pub audio_base_url: String,

    /// Product policy knobs (auto-advance, preloading).
    pub policy: PlaybackPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audio_base_url: DEFAULT_AUDIO_BASE_URL.to_string(),
            policy: PlaybackPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_core(config: &CoreConfig) -> Self {
        Self {
            audio_base_url: config.content.audio_base_url.clone(),
            policy: config.playback,
        }
    }

    pub fn with_audio_base_url(mut self, url: impl Into<String>) -> Self {
        self.audio_base_url = url.into();
        self
    }

    pub fn with_policy(mut self, policy: PlaybackPolicy) -> Self {
        self.policy = policy;
        self
    }
}
