//! # Event Bus System
//!
//! Provides an event-driven architecture for the recitation core using
//! `tokio::sync::broadcast`. The playback engine, the content cache and the
//! preferences repository publish typed events here; hosts subscribe to keep
//! their UI in sync without polling.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   emit   ┌───────────┐
//! │ Playback Engine ├─────────>│           │
//! └─────────────────┘          │           │   subscribe   ┌────────────┐
//!                              │ EventBus  ├──────────────>│ Subscriber │
//! ┌─────────────────┐   emit   │ (broadcast│               └────────────┘
//! │ Content Cache   ├─────────>│  channel) │
//! └─────────────────┘          │           │   subscribe   ┌────────────┐
//!                              │           ├──────────────>│ Subscriber │
//! ┌─────────────────┐   emit   │           │               └────────────┘
//! │ Preferences     ├─────────>│           │
//! └─────────────────┘          └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::ChapterFinished { chapter_id: 1 }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Playback(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns `Err(SendError)`. Publishers inside
//! the core treat that as a no-op.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Verse playback and transport events
    Playback(PlaybackEvent),
    /// Chapter content and prefetch events
    Content(ContentEvent),
    /// Persisted user preference changes
    Preferences(PreferencesEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Content(e) => e.description(),
            CoreEvent::Preferences(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Content(ContentEvent::PrefetchFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::ChapterLoaded { .. })
            | CoreEvent::Playback(PlaybackEvent::ChapterFinished { .. })
            | CoreEvent::Playback(PlaybackEvent::ReciterChanged { .. })
            | CoreEvent::Content(ContentEvent::PrefetchAdvanced { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events emitted by the playback engine.
///
/// `index` is always the zero-based position of the verse inside its chapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A chapter's verses were resolved and became the active session.
    ChapterLoaded {
        chapter_id: u32,
        verse_count: u32,
    },
    /// The active verse changed.
    VerseChanged {
        chapter_id: u32,
        index: u32,
        /// Corpus-wide verse number
        verse_id: u32,
    },
    /// Transport started on a freshly loaded verse.
    Started { chapter_id: u32, index: u32 },
    /// Transport paused.
    Paused {
        chapter_id: u32,
        index: u32,
        position_ms: u64,
    },
    /// Transport resumed after a pause.
    Resumed {
        chapter_id: u32,
        index: u32,
        position_ms: u64,
    },
    /// Progress report from the active clip.
    PositionChanged { position_ms: u64, duration_ms: u64 },
    /// A single verse finished naturally.
    Completed { chapter_id: u32, index: u32 },
    /// The last verse of the chapter finished.
    ChapterFinished { chapter_id: u32 },
    /// The active reciter was replaced.
    ReciterChanged { reciter_id: String },
    /// An operation failed.
    Error {
        message: String,
        /// Whether retrying the same operation may succeed.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::ChapterLoaded { .. } => "Chapter loaded",
            PlaybackEvent::VerseChanged { .. } => "Active verse changed",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::Completed { .. } => "Verse completed",
            PlaybackEvent::ChapterFinished { .. } => "Chapter finished",
            PlaybackEvent::ReciterChanged { .. } => "Reciter changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Content Events
// ============================================================================

/// Events related to chapter content fetching and caching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ContentEvent {
    /// A chapter was fetched and written to the local cache.
    ChapterCached { chapter_id: u32 },
    /// The background prefetch cursor moved forward.
    PrefetchAdvanced { chapter_id: u32 },
    /// A background prefetch step failed; the cursor did not move.
    PrefetchFailed { chapter_id: u32, message: String },
}

impl ContentEvent {
    fn description(&self) -> &str {
        match self {
            ContentEvent::ChapterCached { .. } => "Chapter cached",
            ContentEvent::PrefetchAdvanced { .. } => "Prefetch advanced",
            ContentEvent::PrefetchFailed { .. } => "Prefetch failed",
        }
    }
}

// ============================================================================
// Preferences Events
// ============================================================================

/// Events related to persisted user preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PreferencesEvent {
    /// A favorite was added or removed.
    FavoritesChanged { count: usize },
    /// The last-read marker was overwritten.
    LastReadSaved { chapter_id: u32, verse_id: u32 },
    /// Theme mode changed (`system`, `light` or `dark`).
    ThemeChanged { mode: String },
    /// Reading font size changed.
    FontSizeChanged { size: u32 },
    /// Translation display toggled.
    TranslationToggled { enabled: bool },
}

impl PreferencesEvent {
    fn description(&self) -> &str {
        match self {
            PreferencesEvent::FavoritesChanged { .. } => "Favorites changed",
            PreferencesEvent::LastReadSaved { .. } => "Last read position saved",
            PreferencesEvent::ThemeChanged { .. } => "Theme changed",
            PreferencesEvent::FontSizeChanged { .. } => "Font size changed",
            PreferencesEvent::TranslationToggled { .. } => "Translation toggled",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let playback_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Playback(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
