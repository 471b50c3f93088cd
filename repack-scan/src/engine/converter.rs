//! Archive-to-CBZ conversion engine
//!
//! Extracts the source archive with 7zz into a scratch directory, then writes
//! every extracted file into a deflate-compressed zip named `<stem>.cbz`.

use super::{ConversionEngine, EngineError, SevenZip};
use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Scratch directory name under the system temp dir
pub const DEFAULT_TEMP_DIR_NAME: &str = "comic-repack-conversion";

/// Conversion engine backed by 7zz and the `zip` crate
#[derive(Debug, Clone)]
pub struct SevenZipConverter {
    seven_zip: SevenZip,
    temp_root: PathBuf,
    /// `None` writes next to the source archive
    output_dir: Option<PathBuf>,
}

impl SevenZipConverter {
    pub fn new(seven_zip: SevenZip, temp_root: Option<PathBuf>, output_dir: Option<PathBuf>) -> Self {
        Self {
            seven_zip,
            temp_root: temp_root.unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_TEMP_DIR_NAME)),
            output_dir,
        }
    }

    /// Where the `.cbz` for `source` is written
    pub fn output_path(&self, source: &Path) -> Result<PathBuf, EngineError> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| EngineError::Failed(format!("Invalid file name: {}", source.display())))?;

        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        Ok(dir.join(format!("{}.cbz", stem)))
    }

    fn convert_blocking(&self, source: &Path) -> Result<PathBuf, EngineError> {
        if !source.is_file() {
            return Err(EngineError::Failed(format!(
                "Archive not found: {}",
                source.display()
            )));
        }
        let output = self.output_path(source)?;

        let work_dir = self.temp_root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&work_dir)?;

        let result = self
            .seven_zip
            .extract(source, &work_dir)
            .and_then(|()| write_cbz(&work_dir, &output));

        if let Err(e) = fs::remove_dir_all(&work_dir) {
            warn!(dir = %work_dir.display(), "Failed to remove scratch directory: {}", e);
        }

        result.map(|()| output)
    }
}

#[async_trait]
impl ConversionEngine for SevenZipConverter {
    async fn convert(&self, path: &str) -> Result<String, EngineError> {
        info!(path = %path, "Converting archive");

        let converter = self.clone();
        let source = PathBuf::from(path);
        let output = tokio::task::spawn_blocking(move || converter.convert_blocking(&source))
            .await
            .map_err(|e| EngineError::Failed(format!("Conversion task failed: {}", e)))??;

        info!(path = %path, output = %output.display(), "Conversion finished");
        Ok(output.to_string_lossy().into_owned())
    }
}

/// Zip every file under `content_dir` into `output`
///
/// Entries are sorted and named with forward slashes. The archive is built as
/// `<output>.partial` and renamed into place only once complete.
fn write_cbz(content_dir: &Path, output: &Path) -> Result<(), EngineError> {
    let mut files: Vec<(String, PathBuf)> = WalkDir::new(content_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry_name(content_dir, entry.path())?;
            Some((name, entry.into_path()))
        })
        .collect();

    if files.is_empty() {
        return Err(EngineError::Failed(
            "Archive contained no files".to_string(),
        ));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut partial_name = output.as_os_str().to_owned();
    partial_name.push(".partial");
    let partial = PathBuf::from(partial_name);

    let written = write_entries(&files, &partial);
    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    fs::rename(&partial, output)?;
    debug!(output = %output.display(), entries = files.len(), "CBZ written");
    Ok(())
}

fn write_entries(files: &[(String, PathBuf)], destination: &Path) -> Result<(), EngineError> {
    let zip_error = |e: zip::result::ZipError| EngineError::Failed(format!("Zip error: {}", e));

    let mut writer = ZipWriter::new(BufWriter::new(File::create(destination)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in files {
        writer.start_file(name.as_str(), options).map_err(zip_error)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut writer)?;
    }

    writer.finish().map_err(zip_error)?;
    Ok(())
}

/// Archive entry name for `path`, relative to `base` with `/` separators
fn entry_name(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_output_path_next_to_source() {
        let converter = SevenZipConverter::new(SevenZip::new("7zz"), None, None);
        let output = converter
            .output_path(Path::new("/library/series/issue 01.cbr"))
            .unwrap();
        assert_eq!(output, PathBuf::from("/library/series/issue 01.cbz"));
    }

    #[test]
    fn test_output_path_in_output_dir() {
        let converter = SevenZipConverter::new(
            SevenZip::new("7zz"),
            None,
            Some(PathBuf::from("/converted")),
        );
        let output = converter.output_path(Path::new("/library/a.rar")).unwrap();
        assert_eq!(output, PathBuf::from("/converted/a.cbz"));
    }

    #[test]
    fn test_write_cbz_sorted_forward_slash_entries() {
        let content = TempDir::new().unwrap();
        fs::create_dir(content.path().join("chapter 2")).unwrap();
        fs::write(content.path().join("chapter 2").join("001.jpg"), b"page-b").unwrap();
        fs::write(content.path().join("000.png"), b"page-a").unwrap();

        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("book.cbz");
        write_cbz(content.path(), &output).unwrap();

        assert!(output.exists());
        assert!(!out_dir.path().join("book.cbz.partial").exists());

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["000.png", "chapter 2/001.jpg"]);

        let mut page = String::new();
        archive
            .by_name("chapter 2/001.jpg")
            .unwrap()
            .read_to_string(&mut page)
            .unwrap();
        assert_eq!(page, "page-b");
    }

    #[test]
    fn test_write_cbz_rejects_empty_extraction() {
        let content = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("empty.cbz");

        assert!(write_cbz(content.path(), &output).is_err());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_output() {
        let scratch = TempDir::new().unwrap();
        let converter = SevenZipConverter::new(
            SevenZip::new("7zz"),
            Some(scratch.path().to_path_buf()),
            None,
        );
        let err = converter.convert("/nonexistent/x.cbr").await.unwrap_err();
        assert!(err.to_string().contains("Archive not found"));
    }

    #[tokio::test]
    async fn test_scratch_dir_removed_after_failed_extraction() {
        let scratch = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        let source = library.path().join("a.cbr");
        fs::write(&source, b"not really an archive").unwrap();

        let converter = SevenZipConverter::new(
            SevenZip::new("/nonexistent/7zz"),
            Some(scratch.path().to_path_buf()),
            None,
        );
        let result = converter.convert(&source.to_string_lossy()).await;

        assert!(matches!(result, Err(EngineError::Launch { .. })));
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
        assert!(!library.path().join("a.cbz").exists());
    }
}
