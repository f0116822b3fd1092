//! User bookmarks and their `.mark` sidecar file.
//!
//! Only `(sourcePageId, index)` pairs are persisted. On load each pair is
//! looked up again in the freshly parsed store; pairs that no longer resolve
//! are dropped without complaint.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::{Category, Record};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkEntry {
    #[serde(rename = "sourcePageId")]
    pub source: Category,
    pub index: i64,
}

/// Sidecar next to `log_path`: same directory and stem, `extension` swapped in.
pub fn sidecar_path(log_path: &Path, extension: &str) -> PathBuf {
    log_path.with_extension(extension)
}

#[derive(Debug, Default, Clone)]
pub struct Bookmarks {
    entries: Vec<BookmarkEntry>,
    records: Vec<Record>,
}

impl Bookmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn entries(&self) -> &[BookmarkEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, stable_index: i64) -> bool {
        self.entries.iter().any(|e| e.index == stable_index)
    }

    /// Copies records from `source` into the bookmarks. Records already
    /// bookmarked, or without a stable index, are skipped. Returns whether
    /// anything was added.
    pub fn add<'a, I>(&mut self, source: Category, selected: I) -> bool
    where
        I: IntoIterator<Item = &'a Record>,
    {
        if !source.is_partition() {
            return false;
        }

        let mut added = false;
        for record in selected {
            let Some(index) = record.stable_index else {
                log::debug!("record #{} has no index, not bookmarked", record.sequence);
                continue;
            };
            if self.contains(index) {
                continue;
            }
            self.entries.push(BookmarkEntry { source, index });
            self.records.push(record.clone());
            added = true;
        }
        added
    }

    /// Removes bookmarks by stable index. Returns whether anything changed.
    pub fn remove<'a, I>(&mut self, selected: I) -> bool
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut removed = false;
        for record in selected {
            let Some(index) = record.stable_index else {
                continue;
            };
            if let Some(pos) = self.entries.iter().position(|e| e.index == index) {
                self.entries.remove(pos);
                self.records.remove(pos);
                removed = true;
            }
        }
        removed
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json)?;
        log::debug!("saved {} bookmarks to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// Reads the sidecar and resolves it against `store`. A missing file
    /// yields no bookmarks; a corrupt one is logged and ignored.
    pub fn load(path: &Path, store: &RecordStore) -> Self {
        match Self::read_entries(path) {
            Ok(entries) => Self::resolve(entries, store),
            Err(e) => {
                log::warn!("failed to load bookmark file {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    fn read_entries(path: &Path) -> Result<Vec<BookmarkEntry>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn resolve(entries: Vec<BookmarkEntry>, store: &RecordStore) -> Self {
        let mut bookmarks = Self::new();
        for entry in entries {
            if bookmarks.contains(entry.index) {
                continue;
            }
            match store.find_by_stable_index(entry.source, entry.index) {
                Some(record) => {
                    bookmarks.entries.push(entry);
                    bookmarks.records.push(record.clone());
                }
                None => log::debug!(
                    "bookmark {} in {} no longer resolves",
                    entry.index,
                    entry.source.id()
                ),
            }
        }
        log::info!("loaded {} bookmarks", bookmarks.len());
        bookmarks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(idx: &str, seq: usize) -> Record {
        Record::new(vec![idx.to_string(), "9".to_string(), "ctx".to_string()], seq)
    }

    fn store() -> RecordStore {
        let mut store = RecordStore::new();
        store.push(Category::Trace, record("1", 1));
        store.push(Category::Trace, record("3", 3));
        store.push(Category::Messages, record("2", 2));
        store
    }

    #[test]
    fn adding_twice_keeps_one_entry() {
        let mut b = Bookmarks::new();
        let r = record("7", 1);
        assert!(b.add(Category::Trace, [&r]));
        assert!(!b.add(Category::Trace, [&r]));
        assert_eq!(b.len(), 1);
        assert_eq!(b.records()[0], r);
    }

    #[test]
    fn dedup_is_by_stable_index_across_categories() {
        let mut b = Bookmarks::new();
        assert!(b.add(Category::Trace, [&record("7", 1)]));
        assert!(!b.add(Category::Ota, [&record("7", 9)]));
        assert_eq!(b.entries()[0].source, Category::Trace);
    }

    #[test]
    fn records_without_index_or_from_bookmarks_are_not_added() {
        let mut b = Bookmarks::new();
        assert!(!b.add(Category::Trace, [&record("x", 1)]));
        assert!(!b.add(Category::Bookmarks, [&record("4", 1)]));
        assert!(b.is_empty());
    }

    #[test]
    fn removing_unknown_record_is_a_no_op() {
        let mut b = Bookmarks::new();
        b.add(Category::Trace, [&record("7", 1)]);
        assert!(!b.remove([&record("8", 2)]));
        assert_eq!(b.len(), 1);
        assert!(b.remove([&record("7", 1)]));
        assert!(b.is_empty());
        assert!(b.records().is_empty());
    }

    #[test]
    fn sidecar_replaces_the_extension() {
        assert_eq!(
            sidecar_path(Path::new("/logs/run.log"), "mark"),
            PathBuf::from("/logs/run.mark")
        );
        assert_eq!(
            sidecar_path(Path::new("/logs/run"), "mark"),
            PathBuf::from("/logs/run.mark")
        );
    }

    #[test]
    fn entries_serialize_with_page_ids() {
        let entry = BookmarkEntry {
            source: Category::Ota,
            index: 42,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"sourcePageId":"ota","index":42}"#);
    }

    #[test]
    fn resolve_drops_keys_that_vanished() {
        let entries = vec![
            BookmarkEntry {
                source: Category::Trace,
                index: 3,
            },
            BookmarkEntry {
                source: Category::Trace,
                index: 99,
            },
            BookmarkEntry {
                source: Category::Ota,
                index: 2,
            },
            BookmarkEntry {
                source: Category::Messages,
                index: 2,
            },
        ];
        let b = Bookmarks::resolve(entries, &store());
        let indices: Vec<i64> = b.entries().iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![3, 2]);
        assert_eq!(b.records()[1].sequence, 2);
    }
}
