//! 7-Zip command line wrapper
//!
//! Archive analysis runs `7zz l -slt -y <file>` and reads the technical
//! listing; extraction runs `7zz x -y -o<dir> <file>`. Both calls block, so
//! callers run them on blocking threads.

use super::EngineError;
use repack_common::ArchiveInfo;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, warn};

/// Page image extensions counted in a listing
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Characters of stdout kept in analysis failure messages
const STDOUT_TRACE_CHARS: usize = 200;

/// Classifies one archive file
///
/// Runs on a blocking thread; the error string is attached to the scan
/// result verbatim.
pub trait ArchiveAnalyzer: Send + Sync + 'static {
    fn analyze(&self, path: &Path) -> Result<ArchiveInfo, String>;
}

/// Handle on the 7-Zip binary
#[derive(Debug, Clone)]
pub struct SevenZip {
    binary: PathBuf,
}

impl SevenZip {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// List an archive and derive its properties
    ///
    /// A listing that parses is accepted whatever the exit code: 7zz exits
    /// with code 2 on minor header damage that still leaves a usable listing.
    pub fn list(&self, archive: &Path) -> Result<ArchiveInfo, EngineError> {
        debug!(path = %archive.display(), "Listing archive");

        let output = self.run(|cmd| {
            cmd.args(["l", "-slt", "-y"]).arg(archive);
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_listing(&stdout);

        match parsed {
            Ok(info) => {
                debug!(
                    path = %archive.display(),
                    file_type = %info.file_type,
                    images = info.image_count,
                    solid = info.is_solid,
                    "Archive listed"
                );
                Ok(info)
            }
            Err(parse_error) => match output.status.code() {
                Some(0) => Err(parse_error),
                code => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let trace: String = stdout.trim().chars().take(STDOUT_TRACE_CHARS).collect();
                    warn!(
                        path = %archive.display(),
                        exit_code = ?code,
                        "7zz could not list archive"
                    );
                    Err(EngineError::Failed(format!(
                        "7zz failed with code {}. Stderr: '{}'. Stdout trace: '{}'",
                        code.unwrap_or(-1),
                        stderr.trim(),
                        trace
                    )))
                }
            },
        }
    }

    /// Extract every entry of `archive` into `dest`
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<(), EngineError> {
        debug!(
            path = %archive.display(),
            dest = %dest.display(),
            "Extracting archive"
        );

        let output = self.run(|cmd| {
            cmd.args(["x", "-y"])
                .arg(format!("-o{}", dest.display()))
                .arg(archive);
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed(format!(
                "Extraction failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn run(&self, configure: impl FnOnce(&mut Command)) -> Result<Output, EngineError> {
        let mut cmd = Command::new(&self.binary);
        configure(&mut cmd);
        cmd.output().map_err(|e| EngineError::Launch {
            program: self.binary.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl ArchiveAnalyzer for SevenZip {
    fn analyze(&self, path: &Path) -> Result<ArchiveInfo, String> {
        self.list(path).map_err(|e| e.to_string())
    }
}

/// Parse the output of `7zz l -slt`
///
/// The listing is a series of blank-line separated `Key = Value` blocks. The
/// first block carrying `Type` describes the archive itself; every block with
/// a `Path` ending in an image extension counts as a page.
pub fn parse_listing(output: &str) -> Result<ArchiveInfo, EngineError> {
    let output = output.replace("\r\n", "\n");
    if output.trim().is_empty() {
        return Err(EngineError::Failed("Empty output from 7zz".to_string()));
    }

    let mut file_type: Option<String> = None;
    let mut is_solid = false;
    let mut is_encrypted = false;
    let mut image_count = 0;

    for block in output.split("\n\n") {
        let props = block_properties(block);
        if props.is_empty() {
            continue;
        }

        if file_type.is_none() {
            if let Some(kind) = props.get("Type") {
                file_type = Some(kind.to_string());
                is_solid = props.get("Solid") == Some(&"+");
            }
        }

        // Header-level or per-entry encryption both block conversion
        if props.get("Encrypted") == Some(&"+") {
            is_encrypted = true;
        }

        if let Some(path) = props.get("Path") {
            if is_image_path(path) {
                image_count += 1;
            }
        }
    }

    // Block splitting can fail on odd line endings; fall back to a raw search
    let file_type = match file_type {
        Some(kind) => kind,
        None if output.contains("Type = Rar5") => "Rar5".to_string(),
        None if output.contains("Type = Rar") => "Rar".to_string(),
        None => {
            return Err(EngineError::Failed(
                "7zz listing has no archive type".to_string(),
            ))
        }
    };

    let unsupported_reason = if file_type.eq_ignore_ascii_case("rar5") {
        Some("RAR5 format".to_string())
    } else if is_solid {
        Some("Solid archive".to_string())
    } else {
        None
    };

    Ok(ArchiveInfo {
        file_type,
        is_solid,
        is_encrypted,
        image_count,
        unsupported_reason,
    })
}

/// `Key = Value` pairs of one block, split on the first `=`
fn block_properties(block: &str) -> HashMap<&str, &str> {
    block
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn is_image_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}
