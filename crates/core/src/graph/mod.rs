#![forbid(unsafe_code)]

mod ids;
mod tags;
mod types;

pub use ids::*;
pub use tags::*;
pub use types::*;

#[cfg(test)]
mod tests;
