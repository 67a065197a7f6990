#![forbid(unsafe_code)]

//! SQLite persistence for fault tree analyses: the authoritative node/edge
//! sets, store-allocated ids and the quality issue tracker.

mod store;

pub use store::*;
