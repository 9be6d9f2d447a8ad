//! Thread-safety markers shared by every bridge trait.
//!
//! Native hosts drive the engine from a multi-threaded tokio runtime, so bridge
//! implementations must be shareable across tasks. Single-threaded hosts
//! (wasm32) cannot satisfy `Send + Sync` for their platform handles, so the
//! bounds collapse to nothing there.

/// `Send + Sync` on native targets, no bound on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSendSync for T {}
