//! # alquran.cloud Provider
//!
//! Implements `ChapterSource` for the public alquran.cloud REST API.
//!
//! ## Overview
//!
//! This module provides:
//! - Chapter text fetch for a configurable edition
//! - Best-effort translation merge from a second edition
//! - Response shape validation, failing fast as `ContentUnavailable`

pub mod connector;
pub mod error;
pub mod types;

pub use connector::AlQuranProvider;
pub use error::{ProviderError, Result};
