//! Scan session state machine
//!
//! `Idle -> Scanning -> Idle`, with `Cancelling` as an intent sub-state while
//! the engine has not yet confirmed a cancel. The orchestrator never talks to
//! the engine itself: the service invokes the engine and feeds its events back
//! in here.

use crate::error::RepackError;
use crate::models::{Appended, ResultLog, ScanSession, SessionOutcome};
use repack_common::{ScanResult, SessionStatus};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct ScanOrchestrator {
    session: ScanSession,
}

impl ScanOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn log(&self) -> &ResultLog {
        self.session.log()
    }

    pub(crate) fn log_mut(&mut self) -> &mut ResultLog {
        self.session.log_mut()
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    /// Discard the previous results (new folder picked)
    pub fn reset(&mut self) -> Result<Uuid, RepackError> {
        if self.session.status.is_active() {
            return Err(RepackError::InvalidState(format!(
                "Cannot reset results while {:?}",
                self.session.status
            )));
        }
        self.session = ScanSession::idle();
        Ok(self.session.session_id)
    }

    /// Accept a new scan of `root_folder`
    ///
    /// Clears the log and the scanned count, and returns the new session id.
    /// The caller must start the engine and call [`abort_start`] if it fails.
    ///
    /// [`abort_start`]: Self::abort_start
    pub fn start(&mut self, root_folder: &str) -> Result<Uuid, RepackError> {
        if root_folder.trim().is_empty() {
            return Err(RepackError::InvalidState(
                "No folder selected".to_string(),
            ));
        }
        if self.session.status.is_active() {
            return Err(RepackError::InvalidState(format!(
                "Scan already {:?}",
                self.session.status
            )));
        }

        self.session.begin(root_folder);
        info!(
            session_id = %self.session.session_id,
            root = %root_folder,
            "Scan session started"
        );
        Ok(self.session.session_id)
    }

    /// Engine refused to start: back to a clean Idle
    pub fn abort_start(&mut self, message: &str) {
        warn!(
            session_id = %self.session.session_id,
            "Scan engine failed to start: {}",
            message
        );
        let root_folder = std::mem::take(&mut self.session.root_folder);
        self.session = ScanSession::idle();
        self.session.root_folder = root_folder;
        self.session.outcome = Some(SessionOutcome::Failed);
        self.session.last_error = Some(message.to_string());
    }

    /// Raise the scanned count to `count` if higher; true when it grew
    pub fn on_progress(&mut self, count: u64) -> bool {
        if !self.session.status.is_active() {
            return false;
        }
        if count > self.session.scanned_count {
            self.session.scanned_count = count;
            true
        } else {
            false
        }
    }

    /// Append a result, also while Cancelling
    pub fn on_result(&mut self, item: ScanResult) -> Option<Appended> {
        if !self.session.status.is_active() {
            debug!(path = %item.path, "Ignoring result outside a scan session");
            return None;
        }

        let path = item.path.clone();
        let appended = self.session.log_mut().append(item);
        if appended.duplicate {
            self.session.duplicate_paths += 1;
            warn!(
                session_id = %self.session.session_id,
                path = %path,
                "Engine reported the same path twice"
            );
        }
        Some(appended)
    }

    /// Engine finished; true if a session was ended
    pub fn on_complete(&mut self) -> bool {
        self.end(SessionOutcome::Completed)
    }

    /// Engine confirmed a cancel; true if a session was ended
    pub fn on_cancelled(&mut self) -> bool {
        self.end(SessionOutcome::Cancelled)
    }

    /// Move Scanning to Cancelling
    ///
    /// Returns true when the caller must forward a cancel request to the
    /// engine. Any other state is a no-op.
    pub fn cancel(&mut self) -> bool {
        if self.session.status != SessionStatus::Scanning {
            debug!(status = ?self.session.status, "Cancel ignored");
            return false;
        }
        self.session.status = SessionStatus::Cancelling;
        info!(session_id = %self.session.session_id, "Scan cancel requested");
        true
    }

    /// End the session without engine confirmation
    pub fn force_idle(&mut self, outcome: SessionOutcome, message: &str) -> bool {
        if !self.session.status.is_active() {
            return false;
        }
        warn!(
            session_id = %self.session.session_id,
            outcome = ?outcome,
            "Scan session forced idle: {}",
            message
        );
        self.session.last_error = Some(message.to_string());
        self.session.finish(outcome);
        true
    }

    fn end(&mut self, outcome: SessionOutcome) -> bool {
        if !self.session.status.is_active() {
            return false;
        }
        self.session.finish(outcome);
        info!(
            session_id = %self.session.session_id,
            outcome = ?outcome,
            scanned = self.session.scanned_count,
            results = self.session.log().len(),
            "Scan session ended"
        );
        true
    }
}
