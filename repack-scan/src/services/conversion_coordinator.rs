//! Per-path conversion state
//!
//! Tracks which paths have a conversion in flight and applies resolutions to
//! the result log. Engine calls happen elsewhere; this type only decides
//! whether a conversion may start and what a resolution means.

use crate::error::RepackError;
use crate::models::{ConversionOutcome, ConversionTask, ConversionTicket, ResultLog};
use chrono::Utc;
use repack_common::ItemStatus;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct ConversionCoordinator {
    in_flight: HashMap<String, ConversionTask>,
    next_ticket: u64,
}

impl ConversionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a conversion of `path` and mark it Converting
    pub fn begin(
        &mut self,
        log: &mut ResultLog,
        path: &str,
        session_id: Uuid,
    ) -> Result<ConversionTicket, RepackError> {
        let status = log
            .get(path)
            .map(|entry| entry.status)
            .ok_or_else(|| RepackError::NotFound(path.to_string()))?;

        if self.in_flight.contains_key(path) || status == ItemStatus::Converting {
            return Err(RepackError::InvalidState(format!(
                "Conversion already in progress: {}",
                path
            )));
        }
        if !status.is_convertible() {
            return Err(RepackError::InvalidState(format!(
                "Cannot convert {} while {:?}",
                path, status
            )));
        }

        self.next_ticket += 1;
        let ticket = ConversionTicket {
            id: self.next_ticket,
            path: path.to_string(),
            session_id,
        };
        self.in_flight.insert(
            path.to_string(),
            ConversionTask {
                ticket_id: ticket.id,
                session_id,
                started_at: Utc::now(),
            },
        );
        log.mark_converting(path);

        debug!(path = %path, ticket = ticket.id, "Conversion accepted");
        Ok(ticket)
    }

    /// Apply an engine resolution
    ///
    /// A ticket that no longer matches the in-flight task (the log was reset
    /// meanwhile) is discarded without touching the log.
    pub fn resolve(
        &mut self,
        log: &mut ResultLog,
        ticket: &ConversionTicket,
        result: Result<String, String>,
    ) -> ConversionOutcome {
        let current = self
            .in_flight
            .get(&ticket.path)
            .map(|task| task.ticket_id == ticket.id && task.session_id == ticket.session_id)
            .unwrap_or(false);

        if !current {
            debug!(path = %ticket.path, ticket = ticket.id, "Discarding stale conversion result");
            return ConversionOutcome::Discarded {
                path: ticket.path.clone(),
            };
        }

        if let Some(task) = self.in_flight.remove(&ticket.path) {
            let elapsed = Utc::now() - task.started_at;
            debug!(
                path = %ticket.path,
                elapsed_ms = elapsed.num_milliseconds(),
                "Conversion resolved"
            );
        }

        match result {
            Ok(output_path) => {
                log.mark_converted(&ticket.path);
                info!(path = %ticket.path, output = %output_path, "Archive converted");
                ConversionOutcome::Converted {
                    path: ticket.path.clone(),
                    output_path,
                }
            }
            Err(error) => {
                log.mark_failed(&ticket.path, &error);
                warn!(path = %ticket.path, "Conversion failed: {}", error);
                ConversionOutcome::Failed {
                    path: ticket.path.clone(),
                    error,
                }
            }
        }
    }

    /// Distinct Unsupported paths, in log order, for a convert-all batch
    pub fn snapshot_unsupported(&self, log: &ResultLog) -> Vec<String> {
        log.paths_with_status(ItemStatus::Unsupported)
    }

    /// Forget every in-flight conversion; returns how many were dropped
    pub fn reset(&mut self) -> usize {
        let dropped = self.in_flight.len();
        self.in_flight.clear();
        if dropped > 0 {
            info!(dropped, "Abandoning in-flight conversions");
        }
        dropped
    }

    pub fn is_converting(&self, path: &str) -> bool {
        self.in_flight.contains_key(path)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repack_common::{ArchiveInfo, ScanResult};

    fn log_with(entries: &[(&str, ItemStatus)]) -> ResultLog {
        let mut log = ResultLog::new();
        for (path, status) in entries {
            log.append(ScanResult {
                path: path.to_string(),
                info: Some(ArchiveInfo {
                    file_type: "Rar5".to_string(),
                    is_solid: true,
                    is_encrypted: false,
                    image_count: 24,
                    unsupported_reason: Some("RAR5 format".to_string()),
                }),
                error: None,
                status: *status,
            });
        }
        log
    }

    #[test]
    fn test_successful_conversion_keeps_info() {
        let mut log = log_with(&[("/lib/a.cbr", ItemStatus::Unsupported)]);
        let mut coordinator = ConversionCoordinator::new();
        let session = Uuid::new_v4();

        let ticket = coordinator.begin(&mut log, "/lib/a.cbr", session).unwrap();
        assert_eq!(log.get("/lib/a.cbr").unwrap().status, ItemStatus::Converting);
        assert!(coordinator.is_converting("/lib/a.cbr"));

        let outcome = coordinator.resolve(&mut log, &ticket, Ok("/lib/a.cbz".to_string()));
        assert!(outcome.is_converted());

        let entry = log.get("/lib/a.cbr").unwrap();
        assert_eq!(entry.status, ItemStatus::Converted);
        assert_eq!(entry.info.as_ref().unwrap().image_count, 24);
        assert!(entry.error.is_none());
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[test]
    fn test_failed_conversion_records_message() {
        let mut log = log_with(&[("/lib/b.cbr", ItemStatus::Unsupported)]);
        let mut coordinator = ConversionCoordinator::new();

        let ticket = coordinator.begin(&mut log, "/lib/b.cbr", Uuid::new_v4()).unwrap();
        let outcome = coordinator.resolve(&mut log, &ticket, Err("CRC error".to_string()));

        assert!(matches!(outcome, ConversionOutcome::Failed { ref error, .. } if error == "CRC error"));
        let entry = log.get("/lib/b.cbr").unwrap();
        assert_eq!(entry.status, ItemStatus::Error);
        assert_eq!(entry.error.as_deref(), Some("CRC error"));
        assert!(entry.info.is_some());
    }

    #[test]
    fn test_begin_rejects_unknown_and_inconvertible_paths() {
        let mut log = log_with(&[
            ("/lib/ok.cbz", ItemStatus::Supported),
            ("/lib/done.cbr", ItemStatus::Converted),
            ("/lib/a.cbr", ItemStatus::Unsupported),
        ]);
        let mut coordinator = ConversionCoordinator::new();
        let session = Uuid::new_v4();

        assert!(matches!(
            coordinator.begin(&mut log, "/lib/missing.cbr", session),
            Err(RepackError::NotFound(_))
        ));
        assert!(matches!(
            coordinator.begin(&mut log, "/lib/ok.cbz", session),
            Err(RepackError::InvalidState(_))
        ));
        assert!(matches!(
            coordinator.begin(&mut log, "/lib/done.cbr", session),
            Err(RepackError::InvalidState(_))
        ));

        coordinator.begin(&mut log, "/lib/a.cbr", session).unwrap();
        assert!(matches!(
            coordinator.begin(&mut log, "/lib/a.cbr", session),
            Err(RepackError::InvalidState(_))
        ));
    }

    #[test]
    fn test_retry_from_error_is_allowed() {
        let mut log = log_with(&[("/lib/a.cbr", ItemStatus::Unsupported)]);
        let mut coordinator = ConversionCoordinator::new();
        let session = Uuid::new_v4();

        let first = coordinator.begin(&mut log, "/lib/a.cbr", session).unwrap();
        coordinator.resolve(&mut log, &first, Err("disk full".to_string()));

        let second = coordinator.begin(&mut log, "/lib/a.cbr", session).unwrap();
        assert_ne!(first.id, second.id);
        coordinator.resolve(&mut log, &second, Ok("/lib/a.cbz".to_string()));
        assert_eq!(log.get("/lib/a.cbr").unwrap().status, ItemStatus::Converted);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut log = log_with(&[("/lib/a.cbr", ItemStatus::Unsupported)]);
        let mut coordinator = ConversionCoordinator::new();

        let ticket = coordinator.begin(&mut log, "/lib/a.cbr", Uuid::new_v4()).unwrap();
        assert_eq!(coordinator.reset(), 1);

        // New session with the same path
        let mut fresh = log_with(&[("/lib/a.cbr", ItemStatus::Unsupported)]);
        let outcome = coordinator.resolve(&mut fresh, &ticket, Ok("/lib/a.cbz".to_string()));

        assert_eq!(
            outcome,
            ConversionOutcome::Discarded {
                path: "/lib/a.cbr".to_string()
            }
        );
        assert_eq!(fresh.get("/lib/a.cbr").unwrap().status, ItemStatus::Unsupported);
    }

    #[test]
    fn test_snapshot_takes_unsupported_only() {
        let log = log_with(&[
            ("/lib/a.cbr", ItemStatus::Unsupported),
            ("/lib/b.cbz", ItemStatus::Supported),
            ("/lib/c.cbr", ItemStatus::Error),
            ("/lib/d.cbr", ItemStatus::Unsupported),
        ]);
        let coordinator = ConversionCoordinator::new();

        assert_eq!(
            coordinator.snapshot_unsupported(&log),
            vec!["/lib/a.cbr", "/lib/d.cbr"]
        );
    }
}
