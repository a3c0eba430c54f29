//! # Event Bus System
//!
//! Typed state-transition notifications for the recitation core, carried over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The download manager, playback engine, sequencer and narrator selection
//! never call back into the UI directly. Every observable transition is
//! published as a [`CoreEvent`] and hosts render from the stream:
//!
//! ```text
//! ┌──────────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ DownloadManager  ├────────>│           ├────────────>│  UI layer  │
//! ├──────────────────┤         │ EventBus  │             └────────────┘
//! │ PlaybackEngine   ├────────>│ (broadcast│  subscribe  ┌────────────┐
//! ├──────────────────┤         │  channel) ├────────────>│ Host bridge│
//! │ NarratorSelection├────────>│           │             └────────────┘
//! └──────────────────┘         └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::ActiveUnitChanged {
//!     key: "2:255".to_string(),
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Playback(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events and may
//!   continue. Progress events are the usual cause.
//! - **`RecvError::Closed`**: every sender has been dropped; treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed. Publishers ignore that error.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Audio device and sequencing events
    Playback(PlaybackEvent),
    /// Chapter audio download events
    Download(DownloadEvent),
    /// Narrator catalog and selection events
    Narrator(NarratorEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
            CoreEvent::Narrator(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Rejected { .. }) => EventSeverity::Warning,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Narrator(NarratorEvent::SelectionChanged { .. }) => EventSeverity::Info,
            CoreEvent::Narrator(NarratorEvent::SelectionCleared { .. }) => EventSeverity::Warning,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events emitted by the playback engine and the verse sequencer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A source is being opened on the audio device.
    Loading {
        /// URI of the source.
        uri: String,
    },
    /// Playback started on a freshly loaded source.
    Started { uri: String },
    /// Playback paused. The source stays loaded.
    Paused { uri: String },
    /// Playback resumed after pause.
    Resumed { uri: String },
    /// The source was stopped and released.
    Stopped { uri: String },
    /// The source played to its natural end. `load_id` names the load that
    /// finished, so a replay of the same URI is not mistaken for it.
    Completed { uri: String, load_id: u64 },
    /// Position report from the device.
    PositionChanged {
        uri: String,
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    /// The device could not open or play a source.
    Error {
        uri: Option<String>,
        message: String,
    },
    /// The error display period elapsed and the engine returned to empty.
    ErrorCleared,
    /// A different verse became the active unit; hosts scroll it into view.
    ActiveUnitChanged {
        /// Verse key, e.g. `"2:255"`.
        key: String,
    },
    /// Auto-advance reached the edge of the loaded window and stopped.
    AutoAdvanceStopped {
        /// Last verse that played.
        last_key: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loading { .. } => "Loading audio source",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Playback completed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::ErrorCleared => "Playback error cleared",
            PlaybackEvent::ActiveUnitChanged { .. } => "Active verse changed",
            PlaybackEvent::AutoAdvanceStopped { .. } => "Auto-advance stopped",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events for chapter audio downloads, keyed by chapter and narrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// A transfer was initiated.
    Started { chapter_id: u32, narrator_id: u32 },
    /// Fraction of bytes written, in `0.0..=1.0`.
    Progress {
        chapter_id: u32,
        narrator_id: u32,
        fraction: f64,
    },
    /// The file is complete on disk.
    Completed {
        chapter_id: u32,
        narrator_id: u32,
        path: String,
    },
    /// The transfer failed. `retryable` is false when the asset does not exist.
    Failed {
        chapter_id: u32,
        narrator_id: u32,
        message: String,
        retryable: bool,
    },
    /// A second request for a key already downloading was ignored.
    Rejected { chapter_id: u32, narrator_id: u32 },
    /// Per-key state for a narrator was cleared.
    Reset { narrator_id: u32, cleared: usize },
    /// A single verse recitation was saved locally.
    VerseSaved { verse_key: String, path: String },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Progress { .. } => "Download progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
            DownloadEvent::Rejected { .. } => "Duplicate download rejected",
            DownloadEvent::Reset { .. } => "Download state reset",
            DownloadEvent::VerseSaved { .. } => "Verse audio saved",
        }
    }
}

// ============================================================================
// Narrator Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum NarratorEvent {
    /// The narrator catalog was replaced.
    CatalogLoaded { count: usize },
    /// The user picked a different narrator.
    SelectionChanged {
        previous: Option<u32>,
        current: u32,
    },
    /// The selected narrator disappeared from the catalog.
    SelectionCleared { previous: u32 },
}

impl NarratorEvent {
    fn description(&self) -> &str {
        match self {
            NarratorEvent::CatalogLoaded { .. } => "Narrator catalog loaded",
            NarratorEvent::SelectionChanged { .. } => "Narrator selection changed",
            NarratorEvent::SelectionCleared { .. } => "Narrator selection cleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every clone publishes to the same
/// subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall more than `capacity` events behind receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
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

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let downloads = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Download(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently buffered.
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
