#![forbid(unsafe_code)]

//! Tree-to-table projection: rows, merged-cell spans and filtering.

mod filter;
mod project;
mod row;
mod spans;

pub use filter::{TableView, filter_rows};
pub use project::{Projection, ProjectionReport, project};
pub use row::TableRow;
pub use spans::{CellSpan, SpanMap, compute_row_groups};

pub const MAX_WHY_LEVELS: usize = 9;
/// `failure_mode_top` plus `why_1..why_9`.
pub const COLUMN_COUNT: usize = MAX_WHY_LEVELS + 1;
/// `failure_mode_top` through `why_5`.
pub const DEFAULT_GROUPABLE_COLUMNS: usize = 6;
