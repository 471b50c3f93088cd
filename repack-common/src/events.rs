//! Event types for the repack event system
//!
//! Provides the shared event definitions and the EventBus used to fan state
//! changes out to SSE clients and other observers.

use crate::models::{ItemStatus, ScanResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Repack event types
///
/// Every observable change of the orchestrator is published as one of these.
/// Events serialize with a `type` tag so SSE clients can dispatch on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RepackEvent {
    /// Operator picked a folder; the result log was cleared
    FolderSelected {
        /// Canonical folder path
        path: PathBuf,
        timestamp: DateTime<Utc>,
    },

    /// Scan session accepted and engine started
    ScanStarted {
        session_id: Uuid,
        root_folder: String,
        timestamp: DateTime<Utc>,
    },

    /// Scanned-count advanced
    ///
    /// Only emitted when the clamped count actually grows.
    ScanProgress {
        session_id: Uuid,
        scanned_count: u64,
    },

    /// Result appended to the log
    ScanResultAdded {
        session_id: Uuid,
        /// Position in the result log (0-based)
        index: usize,
        result: ScanResult,
    },

    /// Cancel request forwarded to the engine
    ScanCancelRequested {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Engine finished walking the folder
    ScanCompleted {
        session_id: Uuid,
        scanned_count: u64,
        result_count: usize,
        unsupported_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Engine confirmed cancellation
    ScanCancelled {
        session_id: Uuid,
        scanned_count: u64,
        result_count: usize,
        unsupported_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Session-level failure (engine unreachable, cancel timeout, disconnect)
    ScanFailed {
        session_id: Option<Uuid>,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Conversion accepted for a path
    ConversionStarted {
        path: String,
        timestamp: DateTime<Utc>,
    },

    /// Conversion resolved
    ConversionFinished {
        path: String,
        /// `Converted` or `Error`
        status: ItemStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Convert-all batch snapshot taken
    BatchStarted {
        batch_id: Uuid,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Convert-all batch processed every snapshotted path
    BatchFinished {
        batch_id: Uuid,
        converted: usize,
        failed: usize,
        skipped: usize,
        timestamp: DateTime<Utc>,
    },

    /// Operator toggled the actionable-only filter
    FilterChanged { show_only_actionable: bool },
}

impl RepackEvent {
    /// SSE event name for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            RepackEvent::FolderSelected { .. } => "FolderSelected",
            RepackEvent::ScanStarted { .. } => "ScanStarted",
            RepackEvent::ScanProgress { .. } => "ScanProgress",
            RepackEvent::ScanResultAdded { .. } => "ScanResultAdded",
            RepackEvent::ScanCancelRequested { .. } => "ScanCancelRequested",
            RepackEvent::ScanCompleted { .. } => "ScanCompleted",
            RepackEvent::ScanCancelled { .. } => "ScanCancelled",
            RepackEvent::ScanFailed { .. } => "ScanFailed",
            RepackEvent::ConversionStarted { .. } => "ConversionStarted",
            RepackEvent::ConversionFinished { .. } => "ConversionFinished",
            RepackEvent::BatchStarted { .. } => "BatchStarted",
            RepackEvent::BatchFinished { .. } => "BatchFinished",
            RepackEvent::FilterChanged { .. } => "FilterChanged",
        }
    }

    /// True for events that end a scan session
    pub fn is_session_terminal(&self) -> bool {
        matches!(
            self,
            RepackEvent::ScanCompleted { .. }
                | RepackEvent::ScanCancelled { .. }
                | RepackEvent::ScanFailed { .. }
        )
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the orchestrator)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use repack_common::events::{EventBus, RepackEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(RepackEvent::FilterChanged { show_only_actionable: true });
/// assert!(matches!(rx.try_recv(), Ok(RepackEvent::FilterChanged { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RepackEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped for that subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RepackEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RepackEvent,
    ) -> Result<usize, broadcast::error::SendError<RepackEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RepackEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
