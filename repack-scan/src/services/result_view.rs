//! Read-only projections of the result log

use crate::models::ResultLog;
use repack_common::{ItemStatus, ScanResult};

/// Borrowed view over the current session's results
#[derive(Debug, Clone, Copy)]
pub struct ResultView<'a> {
    log: &'a ResultLog,
    scanned_count: u64,
}

impl<'a> ResultView<'a> {
    pub fn new(log: &'a ResultLog, scanned_count: u64) -> Self {
        Self { log, scanned_count }
    }

    /// Entries in log order; only actionable ones when filtering
    pub fn filtered_results(&self, show_only_actionable: bool) -> Vec<&'a ScanResult> {
        self.log
            .iter()
            .filter(|r| !show_only_actionable || r.status.is_actionable())
            .collect()
    }

    pub fn unsupported_count(&self) -> usize {
        self.log.count_status(ItemStatus::Unsupported)
    }

    /// Files the engine has counted, which may exceed the number of results
    pub fn scanned_count(&self) -> u64 {
        self.scanned_count
    }
}
