//! Reelindex Core Type Definitions
//!
//! Defines fundamental types shared across the indexing and query layers.

use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// ID Types
// =============================================================================

/// Wedding (event namespace) unique identifier
pub type WeddingId = String;

/// Source ("videographer") unique identifier
pub type SourceId = String;

/// Segment unique identifier
pub type SegmentId = String;

/// Person entity unique identifier
pub type PersonId = String;

/// Moment unique identifier
pub type MomentId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Time range within the event timeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: TimeSec,
    pub end: TimeSec,
}

impl TimeRange {
    pub fn new(start: TimeSec, end: TimeSec) -> Self {
        if start > end {
            warn!(
                "TimeRange created with start > end ({} > {}), swapping",
                start, end
            );
            return Self {
                start: end,
                end: start,
            };
        }
        Self { start, end }
    }

    /// Returns duration in seconds
    pub fn duration(&self) -> TimeSec {
        self.end - self.start
    }

    /// Checks if a given time is within range
    pub fn contains(&self, time: TimeSec) -> bool {
        time >= self.start && time <= self.end
    }

    /// Checks overlap against a half-open query window `[start, end)`.
    ///
    /// A range ending exactly at `start`, or starting exactly at `end`,
    /// does not overlap.
    pub fn overlaps_half_open(&self, start: TimeSec, end: TimeSec) -> bool {
        self.start < end && self.end > start
    }

    /// Extends this range to cover `other`.
    pub fn extend(&mut self, other: &TimeRange) {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_duration() {
        let range = TimeRange::new(2.5, 7.5);
        assert_eq!(range.duration(), 5.0);
    }

    #[test]
    fn test_time_range_swaps_inverted_bounds() {
        let range = TimeRange::new(10.0, 5.0);
        assert_eq!(range.start, 5.0);
        assert_eq!(range.end, 10.0);
    }

    #[test]
    fn test_half_open_overlap_boundaries() {
        let range = TimeRange::new(0.0, 10.0);

        // Query window starting exactly where the range ends: no overlap.
        assert!(!range.overlaps_half_open(10.0, 20.0));
        // Query window ending exactly where the range starts: no overlap.
        assert!(!range.overlaps_half_open(-5.0, 0.0));
        // Any shared interior point overlaps.
        assert!(range.overlaps_half_open(9.9, 20.0));
        assert!(range.overlaps_half_open(-5.0, 0.1));
    }

    #[test]
    fn test_time_range_extend() {
        let mut range = TimeRange::new(5.0, 10.0);
        range.extend(&TimeRange::new(2.0, 7.0));
        assert_eq!(range.start, 2.0);
        assert_eq!(range.end, 10.0);

        range.extend(&TimeRange::new(8.0, 15.0));
        assert_eq!(range.end, 15.0);
    }
}
