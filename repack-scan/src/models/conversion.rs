//! Conversion bookkeeping types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one accepted conversion
///
/// A resolution is applied only if its ticket still matches the in-flight
/// task for that path; tickets from a reset session are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTicket {
    pub id: u64,
    pub path: String,
    pub session_id: Uuid,
}

/// In-flight conversion record; removed on resolution
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub ticket_id: u64,
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// What happened to one conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum ConversionOutcome {
    Converted { path: String, output_path: String },
    Failed { path: String, error: String },
    /// The result log was reset while the conversion ran
    Discarded { path: String },
}

impl ConversionOutcome {
    pub fn path(&self) -> &str {
        match self {
            ConversionOutcome::Converted { path, .. }
            | ConversionOutcome::Failed { path, .. }
            | ConversionOutcome::Discarded { path } => path,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted { .. })
    }
}

/// Paths snapshotted by a convert-all request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub batch_id: Uuid,
    pub paths: Vec<String>,
}

/// Tally of a finished convert-all batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    /// No longer convertible when its turn came, or discarded by a reset
    pub skipped: usize,
}

impl BatchReport {
    pub fn new(plan: &BatchPlan) -> Self {
        Self {
            batch_id: plan.batch_id,
            total: plan.paths.len(),
            ..Self::default()
        }
    }
}
