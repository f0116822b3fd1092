use std::collections::HashMap;

use crate::record::{Category, Record};

/// Per-category record sequences for one loaded file, in file order.
#[derive(Debug, Default, Clone)]
pub struct RecordStore {
    trace: Vec<Record>,
    messages: Vec<Record>,
    ota: Vec<Record>,
    file_headers: Vec<String>,
    headers: HashMap<Category, Vec<String>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CategoryCounts {
    pub trace: usize,
    pub messages: usize,
    pub ota: usize,
}

impl CategoryCounts {
    pub fn total(&self) -> usize {
        self.trace + self.messages + self.ota
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the file's own header line and fills in each category's labels.
    pub fn set_file_headers(&mut self, file_headers: &[String]) {
        self.file_headers = file_headers.to_vec();
        for category in Category::ALL {
            let labels = category.headers().iter().map(|s| s.to_string()).collect();
            self.headers.insert(category, labels);
        }
    }

    pub fn file_headers(&self) -> &[String] {
        &self.file_headers
    }

    pub fn headers(&self, category: Category) -> &[String] {
        self.headers
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Appends to `category`. Bookmarks are not stored here and are ignored.
    pub fn push(&mut self, category: Category, record: Record) {
        match category {
            Category::Trace => self.trace.push(record),
            Category::Messages => self.messages.push(record),
            Category::Ota => self.ota.push(record),
            Category::Bookmarks => {
                log::warn!("ignoring push of record {} into bookmarks", record.sequence)
            }
        }
    }

    pub fn records(&self, category: Category) -> &[Record] {
        match category {
            Category::Trace => &self.trace,
            Category::Messages => &self.messages,
            Category::Ota => &self.ota,
            Category::Bookmarks => &[],
        }
    }

    pub fn counts(&self) -> CategoryCounts {
        CategoryCounts {
            trace: self.trace.len(),
            messages: self.messages.len(),
            ota: self.ota.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    /// First record in file order carrying `stable_index`.
    pub fn find_by_stable_index(&self, category: Category, stable_index: i64) -> Option<&Record> {
        self.records(category)
            .iter()
            .find(|r| r.stable_index == Some(stable_index))
    }

    /// All partitions merged back into file order.
    pub fn file_order(&self) -> Vec<&Record> {
        let mut all: Vec<&Record> = self
            .trace
            .iter()
            .chain(self.messages.iter())
            .chain(self.ota.iter())
            .collect();
        all.sort_by_key(|r| r.sequence);
        all
    }
}
