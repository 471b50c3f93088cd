//! Engine boundary
//!
//! The orchestrator talks to the scan and conversion engines only through the
//! traits below. Scan engines push [`ScanEvent`]s into a per-session channel;
//! conversion engines resolve one future per path.
//!
//! Default implementations shell out to the 7-Zip command line tool:
//! - [`WalkdirScanEngine`] walks a folder and lists each archive
//! - [`SevenZipConverter`] extracts an archive and repacks it as `.cbz`

pub mod converter;
pub mod seven_zip;
pub mod walker;

pub use converter::SevenZipConverter;
pub use seven_zip::{ArchiveAnalyzer, SevenZip};
pub use walker::WalkdirScanEngine;

use async_trait::async_trait;
use repack_common::ScanResult;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Events a scan engine pushes while it runs
///
/// A run ends with exactly one `Complete` or `Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// Number of files counted so far
    Progress(u64),
    /// One classified file
    Result(ScanResult),
    /// Walk finished
    Complete,
    /// Walk stopped after a cancel request
    Cancelled,
}

pub type ScanEventSender = mpsc::UnboundedSender<ScanEvent>;
pub type ScanEventReceiver = mpsc::UnboundedReceiver<ScanEvent>;

/// Create the channel for one scan session
pub fn scan_event_channel() -> (ScanEventSender, ScanEventReceiver) {
    mpsc::unbounded_channel()
}

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// External tool could not be launched
    #[error("Failed to run {program}: {reason}")]
    Launch { program: String, reason: String },

    /// Engine-reported failure; the message is shown to the operator as-is
    #[error("{0}")]
    Failed(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem scan engine
pub trait ScanEngine: Send + Sync {
    /// Begin scanning `root`, pushing events into `events`
    ///
    /// Returns once the walk has been started; an `Err` means nothing was
    /// started and no events will follow.
    fn start(&self, root: &Path, events: ScanEventSender) -> Result<(), EngineError>;

    /// Ask the running walk to stop; best-effort
    fn request_cancel(&self);
}

/// Single-file conversion engine
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Convert the archive at `path`, returning the output file path
    async fn convert(&self, path: &str) -> Result<String, EngineError>;
}

/// Source of an operator-chosen directory
pub trait DirectorySelector: Send + Sync {
    /// At most one directory, or `None` if the operator declined
    fn pick(&self) -> Option<PathBuf>;
}

/// Selector that returns a folder fixed at startup (CLI, env or config)
#[derive(Debug, Clone, Default)]
pub struct PresetDirectory {
    folder: Option<PathBuf>,
}

impl PresetDirectory {
    pub fn new(folder: Option<PathBuf>) -> Self {
        Self { folder }
    }
}

impl DirectorySelector for PresetDirectory {
    fn pick(&self) -> Option<PathBuf> {
        self.folder.clone()
    }
}
