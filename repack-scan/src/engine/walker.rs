//! Directory-walking scan engine
//!
//! Walks the chosen folder on a blocking thread, lists every candidate archive
//! through an [`ArchiveAnalyzer`] and streams the outcome into the session
//! channel.

use super::{ArchiveAnalyzer, EngineError, ScanEngine, ScanEvent, ScanEventSender};
use repack_common::ScanResult;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Archive extensions scanned when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["cbr", "cbz", "rar", "zip"];

/// Scan engine backed by `walkdir`
pub struct WalkdirScanEngine {
    analyzer: Arc<dyn ArchiveAnalyzer>,
    /// Lowercase, without the leading dot
    extensions: Vec<String>,
    /// Token of the most recent walk
    current: Mutex<Option<CancellationToken>>,
}

impl WalkdirScanEngine {
    pub fn new(analyzer: Arc<dyn ArchiveAnalyzer>, extensions: &[String]) -> Self {
        let extensions = if extensions.is_empty() {
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
        } else {
            extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect()
        };

        Self {
            analyzer,
            extensions,
            current: Mutex::new(None),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn replace_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        // A walk still running here was abandoned by its session
        if let Some(previous) = current.replace(token.clone()) {
            previous.cancel();
        }
        token
    }
}

impl ScanEngine for WalkdirScanEngine {
    fn start(&self, root: &Path, events: ScanEventSender) -> Result<(), EngineError> {
        if !root.exists() {
            return Err(EngineError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(EngineError::NotADirectory(root.to_path_buf()));
        }

        let token = self.replace_token();
        let analyzer = Arc::clone(&self.analyzer);
        let extensions = self.extensions.clone();
        let root = root.to_path_buf();

        info!(root = %root.display(), "Starting folder walk");
        tokio::task::spawn_blocking(move || {
            walk(&root, analyzer.as_ref(), &extensions, &token, &events);
        });
        Ok(())
    }

    fn request_cancel(&self) {
        let current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(token) = current.as_ref() {
            debug!("Cancel requested for folder walk");
            token.cancel();
        }
    }
}

/// Walk `root` and push events until done, cancelled or disconnected
///
/// The token is checked before every entry. A closed channel means the
/// session was abandoned, so the walk stops silently.
pub fn walk(
    root: &Path,
    analyzer: &dyn ArchiveAnalyzer,
    extensions: &[String],
    token: &CancellationToken,
    events: &ScanEventSender,
) {
    let mut scanned: u64 = 0;

    let entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in entries {
        if token.is_cancelled() {
            info!(root = %root.display(), scanned, "Folder walk cancelled");
            let _ = events.send(ScanEvent::Cancelled);
            return;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
            continue;
        }

        scanned += 1;
        if events.send(ScanEvent::Progress(scanned)).is_err() {
            debug!(root = %root.display(), "Scan channel closed, stopping walk");
            return;
        }

        let path: PathBuf = entry.into_path();
        let result = ScanResult::from_analysis(
            path.to_string_lossy().into_owned(),
            analyzer.analyze(&path),
        );
        if events.send(ScanEvent::Result(result)).is_err() {
            debug!(root = %root.display(), "Scan channel closed, stopping walk");
            return;
        }
    }

    let terminal = if token.is_cancelled() {
        ScanEvent::Cancelled
    } else {
        ScanEvent::Complete
    };
    info!(root = %root.display(), scanned, "Folder walk finished");
    let _ = events.send(terminal);
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}
