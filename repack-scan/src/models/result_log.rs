//! Ordered result log
//!
//! Append-only during a session: entries are never removed or reordered.
//! Only the conversion mark_* methods touch existing entries, and they only
//! change `status` and `error`.

use repack_common::{ItemStatus, ScanResult};
use std::collections::HashMap;

/// Result log in arrival order, indexed by path
#[derive(Debug, Clone, Default)]
pub struct ResultLog {
    entries: Vec<ScanResult>,
    /// Every position holding a given path (duplicates are kept)
    by_path: HashMap<String, Vec<usize>>,
}

/// Where an appended entry landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub index: usize,
    /// The path was already present in this log
    pub duplicate: bool,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the end of the log
    pub fn append(&mut self, item: ScanResult) -> Appended {
        let index = self.entries.len();
        let positions = self.by_path.entry(item.path.clone()).or_default();
        let duplicate = !positions.is_empty();
        positions.push(index);
        self.entries.push(item);
        Appended { index, duplicate }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ScanResult] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanResult> {
        self.entries.iter()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// First entry recorded for `path`
    pub fn get(&self, path: &str) -> Option<&ScanResult> {
        self.by_path
            .get(path)
            .and_then(|positions| positions.first())
            .map(|&index| &self.entries[index])
    }

    /// Number of entries currently at `status`
    pub fn count_status(&self, status: ItemStatus) -> usize {
        self.entries.iter().filter(|r| r.status == status).count()
    }

    /// Distinct paths currently at `status`, in first-arrival order
    pub fn paths_with_status(&self, status: ItemStatus) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .filter(|r| r.status == status)
            .filter(|r| seen.insert(r.path.as_str()))
            .map(|r| r.path.clone())
            .collect()
    }

    /// Drop every entry (new session only)
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.by_path.clear();
    }

    pub(crate) fn mark_converting(&mut self, path: &str) -> usize {
        self.update(path, |entry| entry.status = ItemStatus::Converting)
    }

    /// Success keeps `info` and clears any earlier error
    pub(crate) fn mark_converted(&mut self, path: &str) -> usize {
        self.update(path, |entry| {
            entry.status = ItemStatus::Converted;
            entry.error = None;
        })
    }

    /// Failure keeps `info` so type and image count stay visible
    pub(crate) fn mark_failed(&mut self, path: &str, message: &str) -> usize {
        self.update(path, |entry| {
            entry.status = ItemStatus::Error;
            entry.error = Some(message.to_string());
        })
    }

    fn update(&mut self, path: &str, mut apply: impl FnMut(&mut ScanResult)) -> usize {
        let Some(positions) = self.by_path.get(path) else {
            return 0;
        };
        for &index in positions {
            apply(&mut self.entries[index]);
        }
        positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repack_common::ArchiveInfo;

    fn result(path: &str, status: ItemStatus) -> ScanResult {
        ScanResult {
            path: path.to_string(),
            info: Some(ArchiveInfo {
                file_type: "Rar5".to_string(),
                is_solid: true,
                is_encrypted: false,
                image_count: 20,
                unsupported_reason: Some("RAR5 format".to_string()),
            }),
            error: None,
            status,
        }
    }

    #[test]
    fn test_append_preserves_arrival_order() {
        let mut log = ResultLog::new();
        for path in ["c.cbz", "a.cbz", "b.rar5"] {
            log.append(result(path, ItemStatus::Supported));
        }
        let paths: Vec<_> = log.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["c.cbz", "a.cbz", "b.rar5"]);
    }

    #[test]
    fn test_duplicates_are_kept_and_flagged() {
        let mut log = ResultLog::new();
        let first = log.append(result("a.cbr", ItemStatus::Unsupported));
        let second = log.append(result("a.cbr", ItemStatus::Unsupported));
        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(second.index, 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.paths_with_status(ItemStatus::Unsupported), vec!["a.cbr"]);

        // Marks apply to every entry sharing the path
        assert_eq!(log.mark_converted("a.cbr"), 2);
        assert_eq!(log.count_status(ItemStatus::Converted), 2);
    }

    #[test]
    fn test_marks_keep_archive_info() {
        let mut log = ResultLog::new();
        log.append(result("b.rar5", ItemStatus::Unsupported));
        let info_before = log.get("b.rar5").unwrap().info.clone();

        log.mark_converting("b.rar5");
        log.mark_failed("b.rar5", "corrupt header");
        let entry = log.get("b.rar5").unwrap();
        assert_eq!(entry.status, ItemStatus::Error);
        assert_eq!(entry.error.as_deref(), Some("corrupt header"));
        assert_eq!(entry.info, info_before);

        log.mark_converted("b.rar5");
        let entry = log.get("b.rar5").unwrap();
        assert_eq!(entry.status, ItemStatus::Converted);
        assert!(entry.error.is_none());
        assert_eq!(entry.info, info_before);
    }

    #[test]
    fn test_mark_unknown_path_touches_nothing() {
        let mut log = ResultLog::new();
        log.append(result("a.cbr", ItemStatus::Unsupported));
        assert_eq!(log.mark_converting("missing.cbr"), 0);
        assert_eq!(log.count_status(ItemStatus::Unsupported), 1);
    }
}
