//! # Playback Module
//!
//! Verse-by-verse recitation playback on top of a host [`ClipPlayer`].
//!
//! ## Overview
//!
//! This module handles:
//! - Clip lifetime (load, transport, status routing, release) via [`ClipHandle`]
//! - Sequencing verses of a chapter with [`PlaybackEngine`]
//! - Preloading the neighbouring verses for gapless skips
//! - Hot-swapping the reciter mid-session
//!
//! [`ClipPlayer`]: bridge_traits::playback::ClipPlayer

pub mod clip;
pub mod config;
pub mod engine;
pub mod error;
pub mod slots;

pub use clip::ClipHandle;
pub use config::{EngineConfig, DEFAULT_AUDIO_BASE_URL};
pub use engine::{PlaybackEngine, PlaybackPhase, PlaybackSnapshot, SkipDirection};
pub use error::{PlaybackError, Result};
