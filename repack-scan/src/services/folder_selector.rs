//! Folder selection validation
//!
//! Checks an operator-chosen folder before it becomes the scan root.

use repack_common::{Error, Result};
use std::path::{Path, PathBuf};

/// Folder selection validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionResult {
    /// Usable folder (canonical path)
    Valid(PathBuf),
    /// Folder does not exist
    NotFound(PathBuf),
    /// Path exists but is a file
    NotADirectory(PathBuf),
    /// Folder exists but its entries cannot be listed
    NotReadable(PathBuf),
}

pub struct FolderSelector;

impl FolderSelector {
    /// Validate folder selection
    ///
    /// Canonicalizes the path, which also resolves symlinks and relative
    /// components. Symlink loops surface as `Err(InvalidInput)`.
    pub fn validate_selection(selected_folder: &Path) -> Result<SelectionResult> {
        tracing::debug!(selected = %selected_folder.display(), "Validating folder selection");

        if !selected_folder.exists() {
            tracing::warn!(folder = %selected_folder.display(), "Selected folder does not exist");
            return Ok(SelectionResult::NotFound(selected_folder.to_path_buf()));
        }

        if !selected_folder.is_dir() {
            tracing::warn!(path = %selected_folder.display(), "Selected path is not a directory");
            return Ok(SelectionResult::NotADirectory(selected_folder.to_path_buf()));
        }

        let canonical = selected_folder.canonicalize().map_err(|e| {
            tracing::warn!(
                folder = %selected_folder.display(),
                error = %e,
                "Symlink loop or canonicalization error detected"
            );
            Error::InvalidInput(format!(
                "Symlink loop or invalid path: {} ({})",
                selected_folder.display(),
                e
            ))
        })?;

        if std::fs::read_dir(&canonical).is_err() {
            tracing::warn!(folder = %canonical.display(), "Selected folder is not readable");
            return Ok(SelectionResult::NotReadable(canonical));
        }

        tracing::info!(folder = %canonical.display(), "Folder selected");
        Ok(SelectionResult::Valid(canonical))
    }

    /// Validate and return the canonical folder, or the matching error
    pub fn validate(selected_folder: &Path) -> Result<PathBuf> {
        match Self::validate_selection(selected_folder)? {
            SelectionResult::Valid(path) => Ok(path),
            SelectionResult::NotFound(path) => Err(Error::NotFound(format!(
                "Folder not found: {}",
                path.display()
            ))),
            SelectionResult::NotADirectory(path) => Err(Error::InvalidInput(format!(
                "Not a directory: {}",
                path.display()
            ))),
            SelectionResult::NotReadable(path) => Err(Error::InvalidInput(format!(
                "Folder is not readable: {}",
                path.display()
            ))),
        }
    }
}
