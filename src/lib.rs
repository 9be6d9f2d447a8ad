//! Workspace umbrella crate.
//!
//! Re-exports the recitation core behind feature flags so host applications
//! can depend on one crate. `desktop-shims` (default) brings in the service
//! façade with the bundled desktop bridges; `engine` exposes the playback
//! engine and content library directly for hosts that wire their own service.

#[cfg(feature = "desktop-shims")]
pub use core_service::{config, events, logging, AppState, CoreError, CoreService};

#[cfg(feature = "engine")]
pub use core_library as library;

#[cfg(feature = "engine")]
pub use core_playback as playback;
