//! Content Index Module
//!
//! Per-source structured indexes built from raw segment and appearance
//! inputs: time, person, and moment views over one capture stream.

pub mod moment;
pub mod person;
pub mod time;

pub use moment::{MomentEntity, MomentIndex};
pub use person::{Appearance, AppearanceRecord, IndexStats, PersonEntity, PersonIndex};
pub use time::{Segment, TimeIndex};

/// Manifest/index schema version
pub const SCHEMA_VERSION: &str = "1.0";

/// Default false-positive rate for per-index bloom filters
pub const DEFAULT_FP_RATE: f64 = 0.01;
