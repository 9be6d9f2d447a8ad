//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the recitation core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions,
//! for the validated [`CoreConfig`](config::CoreConfig) it is built from, and
//! for the [`EventBus`](events::EventBus) it publishes state changes on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
