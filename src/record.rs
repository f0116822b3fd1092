use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::parser::leading_int;

const TRACE_HEADERS: &[&str] = &["Index", "LogID", "Level", "Module", "SFN", "Time", "Context"];
const MESSAGES_HEADERS: &[&str] = &[
    "Index",
    "LogID",
    "SrcMod",
    "DstMod",
    "SFN",
    "Time",
    "Message",
    "Msg Content",
];
const OTA_HEADERS: &[&str] = &[
    "Index",
    "LogID",
    "SrcMod",
    "DstMod",
    "SFN",
    "Time",
    "OTA Message",
    "Msg Content",
];
const BOOKMARKS_HEADERS: &[&str] = &[
    "Index",
    "LogID",
    "Level/SrcMod",
    "Module",
    "SFN",
    "Time",
    "Context",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Trace,
    Messages,
    Ota,
    Bookmarks,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Trace,
        Category::Messages,
        Category::Ota,
        Category::Bookmarks,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Category::Trace => "trace",
            Category::Messages => "messages",
            Category::Ota => "ota",
            Category::Bookmarks => "bookmarks",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Trace => "Trace",
            Category::Messages => "Messages",
            Category::Ota => "OTA",
            Category::Bookmarks => "Bookmarks",
        }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            Category::Trace => TRACE_HEADERS,
            Category::Messages => MESSAGES_HEADERS,
            Category::Ota => OTA_HEADERS,
            Category::Bookmarks => BOOKMARKS_HEADERS,
        }
    }

    pub fn is_partition(&self) -> bool {
        !matches!(self, Category::Bookmarks)
    }
}

/// Routes a data line by its type code in `fields[1]`.
pub fn classify(fields: &[String]) -> Category {
    let code = fields.get(1).and_then(|f| leading_int(f)).unwrap_or(0);
    match code {
        1 => Category::Messages,
        2..=4 => Category::Ota,
        _ => Category::Trace,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub fields: Vec<String>,
    pub stable_index: Option<i64>,
    pub sequence: usize,
}

impl Record {
    pub fn new(fields: Vec<String>, sequence: usize) -> Self {
        let stable_index = fields.first().and_then(|f| leading_int(f));
        Self {
            fields,
            stable_index,
            sequence,
        }
    }

    pub fn field(&self, column: usize) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    /// Text of table column `column` out of `columns`. Fields past the
    /// last column are folded into it.
    pub fn cell(&self, column: usize, columns: usize) -> Cow<'_, str> {
        if column + 1 == columns && self.fields.len() > columns {
            Cow::Owned(self.fields[column..].join("   "))
        } else {
            Cow::Borrowed(self.field(column))
        }
    }

    /// Label shown in the index column when field 0 is not a number.
    pub fn display_index(&self) -> String {
        match self.stable_index {
            Some(idx) => idx.to_string(),
            None => format!("#{}", self.sequence),
        }
    }
}
