#![forbid(unsafe_code)]

//! Cause-tree consistency engine for fault tree analysis: the tree store, the
//! tree-to-table projection, path-based table edits, risk scoring, quality
//! heuristics and the undo log.

pub mod config;
pub mod fields;
pub mod graph;
pub mod history;
pub mod ids;
pub mod path;
pub mod quality;
pub mod risk;
pub mod session;
pub mod table;
pub mod tree;
