//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `BackgroundExecutor` using Tokio tasks
//!
//! Audio output is not provided here; desktop hosts inject their own
//! `ClipPlayer`.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let settings = SqliteSettingsStore::in_memory().await?;
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod background;
mod http;
mod settings;

pub use background::{ConnectivityCheck, TokioBackgroundExecutor};
pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
