use crate::record::{Category, Record};

pub const MODULE_COLUMN: usize = 3;
pub const CONTEXT_COLUMN: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub term: String,
    pub module: bool,
    pub context: bool,
}

impl SearchQuery {
    fn columns(&self) -> Vec<usize> {
        let mut columns = Vec::with_capacity(2);
        if self.module {
            columns.push(MODULE_COLUMN);
        }
        if self.context {
            columns.push(CONTEXT_COLUMN);
        }
        columns
    }

    pub fn is_active(&self) -> bool {
        !self.term.is_empty() && (self.module || self.context)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub category: Category,
    pub position: usize,
    pub stable_index: Option<i64>,
    pub fields: Vec<String>,
}

/// Case-insensitive substring search over the chosen columns of `records`.
///
/// Cells are compared as the table shows them for a category with
/// `table_columns` columns.
pub fn search(
    category: Category,
    records: &[Record],
    table_columns: usize,
    query: &SearchQuery,
) -> Vec<SearchHit> {
    if !query.is_active() {
        return Vec::new();
    }

    let needle = query.term.to_lowercase();
    let columns = query.columns();

    records
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            columns
                .iter()
                .any(|&col| {
                    record
                        .cell(col, table_columns)
                        .to_lowercase()
                        .contains(&needle)
                })
        })
        .map(|(position, record)| SearchHit {
            category,
            position,
            stable_index: record.stable_index,
            fields: record.fields.clone(),
        })
        .collect()
}
