#![forbid(unsafe_code)]

use super::{SpanMap, TableRow, compute_row_groups};
use serde::Serialize;

/// Case-insensitive substring match over the row's text fields. A blank
/// query keeps every row.
pub fn filter_rows<'a>(rows: &'a [TableRow], query: &str) -> Vec<&'a TableRow> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.iter().collect();
    }
    rows.iter()
        .filter(|row| {
            row.searchable()
                .any(|text| text.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Rows plus span metadata as handed to the renderer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TableView {
    pub rows: Vec<TableRow>,
    pub spans: SpanMap,
    pub filtered: bool,
}

impl TableView {
    /// Filtering disables merging: a filtered row set no longer has
    /// contiguous parent groups, so every cell gets `{1, true}`.
    pub fn build(rows: &[TableRow], query: &str, groupable_columns: usize) -> Self {
        if query.trim().is_empty() {
            return Self {
                rows: rows.to_vec(),
                spans: compute_row_groups(rows, groupable_columns),
                filtered: false,
            };
        }
        let rows: Vec<TableRow> = filter_rows(rows, query).into_iter().cloned().collect();
        Self {
            spans: SpanMap::unmerged(rows.len(), groupable_columns),
            rows,
            filtered: true,
        }
    }
}
