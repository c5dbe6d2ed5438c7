//! # Event Bus System
//!
//! Typed events published by the session manager and the transfer runs, fanned
//! out to any number of observers (status bar, console pane, progress panel)
//! over a broadcast channel.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps [`SessionEvent`], [`TransferEvent`]
//!   and [`CatalogEvent`]
//! - **EventBus**: broadcast channel shared by every publisher
//! - **EventStream**: a receiver that skips events it does not care about
//!
//! Per-run progress is also available as a `watch` value on each orchestrator;
//! the bus carries the same milestones for observers that want history rather
//! than the latest value.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, TransferDirection, TransferEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Transfer(TransferEvent::Progress {
//!         run_id: "run-1".to_string(),
//!         direction: TransferDirection::Upload,
//!         completed: 1,
//!         total: 4,
//!         percent: 25,
//!         status: "Uploading... 1/4 files".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Thread Safety
//!
//! `EventBus` is `Clone` and can be shared across tasks; emitting never
//! blocks. Emitting with no subscribers returns an error that publishers
//! ignore with `.ok()`.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_async::sync::broadcast::error::TryRecvError;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Login/logout and credential validation
    Session(SessionEvent),
    /// Upload and download runs
    Transfer(TransferEvent),
    /// Catalog browsing (bulk info refresh, smart search)
    Catalog(CatalogEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Transfer(e) => e.description(),
            CoreEvent::Catalog(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::SessionError { .. }) => EventSeverity::Error,
            CoreEvent::Transfer(TransferEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Catalog(CatalogEvent::RefreshFailed { .. }) => EventSeverity::Error,
            CoreEvent::Transfer(TransferEvent::ItemFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Transfer(TransferEvent::OrganizationFailed { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Session(SessionEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Transfer(TransferEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Transfer(TransferEvent::Stopped { .. }) => EventSeverity::Info,
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
// Session Events
// ============================================================================

/// Events related to the server login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// Credentials validated against the server.
    SignedIn {
        base_url: String,
        /// Account name as reported by the server.
        user_name: String,
    },
    /// Persisted credentials were removed.
    SignedOut { base_url: String },
    /// Login, restore or re-validation failed.
    SessionError {
        message: String,
        /// `false` when the server rejected the credentials outright.
        recoverable: bool,
    },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::SignedIn { .. } => "Signed in to server",
            SessionEvent::SignedOut { .. } => "Signed out",
            SessionEvent::SessionError { .. } => "Session error",
        }
    }
}

// ============================================================================
// Transfer Events
// ============================================================================

/// Which way a run moves assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Upload,
    Download,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Upload => "upload",
            TransferDirection::Download => "download",
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Milestones of an upload or download run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TransferEvent {
    /// Discovery finished; the transfer loop is about to begin.
    Started {
        run_id: String,
        direction: TransferDirection,
        total: u64,
    },
    /// One item finished (successfully or not).
    Progress {
        run_id: String,
        direction: TransferDirection,
        completed: u64,
        total: u64,
        /// Progress percentage (0-100).
        percent: u8,
        status: String,
    },
    /// An item exhausted its retries and was skipped.
    ItemFailed {
        run_id: String,
        direction: TransferDirection,
        /// File name or asset id.
        item: String,
        message: String,
        attempts: u32,
    },
    /// An album/tag/description step failed; other steps continue.
    OrganizationFailed {
        run_id: String,
        /// Organization pass name (e.g. "directory_albums").
        pass: String,
        /// Album/tag name or asset id the step was working on.
        subject: String,
        message: String,
    },
    /// The run finished its loop without being stopped.
    Completed {
        run_id: String,
        direction: TransferDirection,
        succeeded: u64,
        failed: u64,
        duration_secs: u64,
    },
    /// The run honoured a cancel request.
    Stopped {
        run_id: String,
        direction: TransferDirection,
        completed: u64,
        total: u64,
    },
    /// The run hit an unexpected error and was forced to its terminal state.
    Failed {
        run_id: String,
        direction: TransferDirection,
        message: String,
    },
}

impl TransferEvent {
    fn description(&self) -> &str {
        match self {
            TransferEvent::Started { .. } => "Transfer started",
            TransferEvent::Progress { .. } => "Transfer in progress",
            TransferEvent::ItemFailed { .. } => "Transfer item failed",
            TransferEvent::OrganizationFailed { .. } => "Organization step failed",
            TransferEvent::Completed { .. } => "Transfer completed",
            TransferEvent::Stopped { .. } => "Transfer stopped",
            TransferEvent::Failed { .. } => "Transfer failed",
        }
    }

    /// Run the event belongs to.
    pub fn run_id(&self) -> &str {
        match self {
            TransferEvent::Started { run_id, .. }
            | TransferEvent::Progress { run_id, .. }
            | TransferEvent::ItemFailed { run_id, .. }
            | TransferEvent::OrganizationFailed { run_id, .. }
            | TransferEvent::Completed { run_id, .. }
            | TransferEvent::Stopped { run_id, .. }
            | TransferEvent::Failed { run_id, .. } => run_id,
        }
    }
}

// ============================================================================
// Catalog Events
// ============================================================================

/// Events from catalog browsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    /// Album, tag and people listings were refreshed.
    Refreshed {
        albums: u64,
        tags: u64,
        people: u64,
        /// Sections that could not be listed.
        failed_sections: Vec<String>,
    },
    /// A smart search returned.
    SearchCompleted { query: String, results: u64 },
    /// The refresh run failed as a whole.
    RefreshFailed { message: String },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::Refreshed { .. } => "Catalog refreshed",
            CatalogEvent::SearchCompleted { .. } => "Smart search completed",
            CatalogEvent::RefreshFailed { .. } => "Catalog refresh failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast fan-out of [`CoreEvent`]s.
///
/// Cloning shares the underlying channel. Every subscriber sees every event
/// emitted after it subscribed; one that falls more than `capacity` events
/// behind gets `RecvError::Lagged` and resumes from the oldest retained event.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Sends to all current subscribers and returns how many there were.
    ///
    /// Fails only when nobody is subscribed; publishers discard that with
    /// `.ok()`.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

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
// Event Stream
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A subscriber that skips events its predicate rejects.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream};
///
/// let event_bus = EventBus::new(16);
/// let mut progress_panel = EventStream::transfers(event_bus.subscribe());
/// assert!(progress_panel.try_recv().is_none());
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

    /// Only upload and download milestones.
    pub fn transfers(receiver: Receiver<CoreEvent>) -> Self {
        Self::new(receiver).filter(|event| matches!(event, CoreEvent::Transfer(_)))
    }

    /// Only transfer milestones of one run.
    pub fn for_run(receiver: Receiver<CoreEvent>, run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        Self::new(receiver).filter(move |event| {
            matches!(event, CoreEvent::Transfer(transfer) if transfer.run_id() == run_id)
        })
    }

    /// Replaces the predicate.
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

    /// Waits for the next accepted event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` after falling `n` events behind,
    /// `RecvError::Closed` once every bus clone is dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// `None` when no accepted event is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
