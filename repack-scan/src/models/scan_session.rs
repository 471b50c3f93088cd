//! Scan session state
//!
//! One session runs from an accepted StartScan until the engine confirms
//! completion or cancellation (or the orchestrator gives up on it).

use super::ResultLog;
use chrono::{DateTime, Utc};
use repack_common::{ItemStatus, SessionStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the last session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOutcome {
    /// Engine walked the whole folder
    Completed,
    /// Engine confirmed a cancel request
    Cancelled,
    /// Engine never confirmed a cancel request; forced to Idle
    TimedOut,
    /// Engine could not be started or dropped its channel
    Failed,
}

/// Scan session (in-memory state)
///
/// Handed out only as `&ScanSession`; every mutation goes through the
/// orchestrator or the conversion coordinator.
#[derive(Debug, Clone)]
pub struct ScanSession {
    /// Unique session identifier, regenerated on every reset
    pub session_id: Uuid,

    pub status: SessionStatus,

    /// Folder being scanned (empty before the first scan)
    pub root_folder: String,

    /// Highest progress count observed; never decreases within a session
    pub scanned_count: u64,

    pub started_at: Option<DateTime<Utc>>,

    pub ended_at: Option<DateTime<Utc>>,

    pub outcome: Option<SessionOutcome>,

    /// Session-level failure description
    pub last_error: Option<String>,

    /// Results whose path was already in the log
    pub duplicate_paths: usize,

    pub(crate) log: ResultLog,
}

/// Serializable view of a session for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub root_folder: String,
    pub scanned_count: u64,
    pub result_count: usize,
    pub unsupported_count: usize,
    pub converting_count: usize,
    pub duplicate_paths: usize,
    pub outcome: Option<SessionOutcome>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ScanSession {
    /// Fresh idle session with an empty log
    pub fn idle() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            status: SessionStatus::Idle,
            root_folder: String::new(),
            scanned_count: 0,
            started_at: None,
            ended_at: None,
            outcome: None,
            last_error: None,
            duplicate_paths: 0,
            log: ResultLog::new(),
        }
    }

    /// Reset for a new scan of `root_folder`
    pub(crate) fn begin(&mut self, root_folder: &str) {
        *self = Self::idle();
        self.status = SessionStatus::Scanning;
        self.root_folder = root_folder.to_string();
        self.started_at = Some(Utc::now());
    }

    /// Transition to Idle and record the outcome
    pub(crate) fn finish(&mut self, outcome: SessionOutcome) {
        self.status = SessionStatus::Idle;
        self.outcome = Some(outcome);
        self.ended_at = Some(Utc::now());
    }

    pub fn log(&self) -> &ResultLog {
        &self.log
    }

    pub(crate) fn log_mut(&mut self) -> &mut ResultLog {
        &mut self.log
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            status: self.status,
            root_folder: self.root_folder.clone(),
            scanned_count: self.scanned_count,
            result_count: self.log.len(),
            unsupported_count: self.log.count_status(ItemStatus::Unsupported),
            converting_count: self.log.count_status(ItemStatus::Converting),
            duplicate_paths: self.duplicate_paths,
            outcome: self.outcome,
            last_error: self.last_error.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::idle()
    }
}
