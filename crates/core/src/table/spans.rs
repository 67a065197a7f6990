#![forbid(unsafe_code)]

use super::{COLUMN_COUNT, TableRow};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CellSpan {
    /// Rows covered by this cell; 0 means the cell is covered from above.
    pub row_span: usize,
    pub is_first: bool,
}

impl CellSpan {
    pub const SINGLE: Self = Self {
        row_span: 1,
        is_first: true,
    };

    const COVERED: Self = Self {
        row_span: 0,
        is_first: false,
    };
}

/// Per-row, per-column merge metadata for the chain columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SpanMap {
    columns: usize,
    spans: Vec<Vec<CellSpan>>,
}

impl SpanMap {
    /// Every cell renders on its own.
    pub fn unmerged(rows: usize, columns: usize) -> Self {
        let columns = columns.min(COLUMN_COUNT);
        Self {
            columns,
            spans: vec![vec![CellSpan::SINGLE; columns]; rows],
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.spans.len()
    }

    pub fn get(&self, row: usize, column: usize) -> Option<CellSpan> {
        self.spans.get(row).and_then(|r| r.get(column)).copied()
    }

    pub fn row(&self, row: usize) -> &[CellSpan] {
        self.spans.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_merges(&self) -> bool {
        self.spans.iter().flatten().any(|s| s.row_span != 1)
    }
}

/// Groups consecutive rows per chain column for merged-cell rendering.
///
/// Column `c` of a row joins the group above only when columns `0..=c` are
/// all equal to the previous row's, so equal text under different parents
/// never merges. Blank cells never merge. The function does not know about
/// filtering; feeding it a filtered row set is the caller's decision.
pub fn compute_row_groups(rows: &[TableRow], columns: usize) -> SpanMap {
    let mut map = SpanMap::unmerged(rows.len(), columns);
    for column in 0..map.columns {
        let mut start = 0;
        for index in 1..rows.len() {
            if continues_group(&rows[index - 1], &rows[index], column) {
                map.spans[index][column] = CellSpan::COVERED;
                map.spans[start][column].row_span += 1;
            } else {
                start = index;
            }
        }
    }
    map
}

fn continues_group(prev: &TableRow, row: &TableRow, column: usize) -> bool {
    row.column(column).is_some() && (0..=column).all(|c| prev.column(c) == row.column(c))
}
