//! Reelindex Core Engine
//!
//! Hierarchical, multi-source index over video segments with fast
//! "does entity X appear anywhere" and "find all appearances" queries.
//! Per-source content indexes are guarded by probabilistic filters so a
//! query never has to scan every index exhaustively.
//!
//! Data flows bottom-up for construction (raw records -> filters/indexes ->
//! manifests -> storage) and top-down for queries (manifest -> bloom
//! filters -> indexes -> assembled result).

pub mod builder;
pub mod filters;
pub mod index;
pub mod manifest;
pub mod query;
pub mod storage;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
