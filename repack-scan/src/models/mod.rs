//! Data models for repack-scan

pub mod conversion;
pub mod result_log;
pub mod scan_session;

pub use conversion::{BatchPlan, BatchReport, ConversionOutcome, ConversionTask, ConversionTicket};
pub use result_log::{Appended, ResultLog};
pub use scan_session::{ScanSession, SessionOutcome, SessionSummary};
