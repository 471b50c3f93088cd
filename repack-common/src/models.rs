//! Archive and scan-result models
//!
//! These are the data shapes exchanged between the scan engine, the
//! orchestrator and the presentation layer. They serialize with the same field
//! names the UI consumes (`file_type`, `is_solid`, ...).

use serde::{Deserialize, Serialize};

/// Archive properties reported by the analysis engine
///
/// Produced once per scanned file and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    /// Container type label ("Rar5", "Rar", "zip", ...)
    pub file_type: String,
    /// Entries are compressed as one contiguous stream
    pub is_solid: bool,
    /// Archive or any entry is encrypted
    pub is_encrypted: bool,
    /// Number of image entries found in the listing
    pub image_count: usize,
    /// Why readers cannot open this archive directly, if they cannot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsupported_reason: Option<String>,
}

impl ArchiveInfo {
    /// True when the archive needs conversion before readers can open it
    pub fn needs_conversion(&self) -> bool {
        self.unsupported_reason.is_some()
    }
}

/// Per-item status
///
/// Conversion only moves an item along
/// `Unsupported -> Converting -> Converted | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Not yet classified
    Pending,
    /// Readable as-is
    Supported,
    /// Identified but not readable; candidate for conversion
    Unsupported,
    /// Conversion in flight
    Converting,
    /// Conversion finished successfully
    Converted,
    /// Analysis or conversion failed
    Error,
}

impl ItemStatus {
    /// Statuses shown when the operator filters to actionable items
    pub fn is_actionable(self) -> bool {
        matches!(
            self,
            ItemStatus::Unsupported | ItemStatus::Converted | ItemStatus::Error
        )
    }

    /// Statuses a conversion may start from
    ///
    /// `Error` is included so the operator can re-run a failed conversion.
    pub fn is_convertible(self) -> bool {
        matches!(self, ItemStatus::Unsupported | ItemStatus::Error)
    }
}

/// One scanned file as recorded in the result log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Absolute path of the archive
    pub path: String,
    /// Archive properties, when analysis succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ArchiveInfo>,
    /// Analysis or conversion failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Current status
    pub status: ItemStatus,
}

impl ScanResult {
    /// Create an unclassified result
    pub fn pending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            info: None,
            error: None,
            status: ItemStatus::Pending,
        }
    }

    /// Classify an analysis outcome
    ///
    /// An archive with an `unsupported_reason` is `Unsupported`, any other
    /// parsed archive is `Supported`, and an analysis failure is `Error`.
    pub fn from_analysis(
        path: impl Into<String>,
        analysis: std::result::Result<ArchiveInfo, String>,
    ) -> Self {
        let mut result = Self::pending(path);
        match analysis {
            Ok(info) => {
                result.status = if info.needs_conversion() {
                    ItemStatus::Unsupported
                } else {
                    ItemStatus::Supported
                };
                result.info = Some(info);
            }
            Err(message) => {
                result.status = ItemStatus::Error;
                result.error = Some(message);
            }
        }
        result
    }

    /// File name component of the path, for display
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(self.path.as_str())
    }
}

/// Scan session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No scan running
    Idle,
    /// Scan engine is walking the folder
    Scanning,
    /// Cancel requested; waiting for the engine to confirm
    Cancelling,
}

impl SessionStatus {
    /// True while a session holds the scan engine
    pub fn is_active(self) -> bool {
        !matches!(self, SessionStatus::Idle)
    }
}
