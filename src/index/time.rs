//! Time Index
//!
//! Orders a source's segments by capture sequence and answers
//! time-range overlap queries with half-open boundary semantics.

use serde::{Deserialize, Serialize};

use crate::index::SCHEMA_VERSION;
use crate::{MomentId, SegmentId, TimeRange, TimeSec};

// =============================================================================
// Segment Model
// =============================================================================

/// Atomic indexing unit: one fixed-duration piece of captured video
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Unique segment ID
    pub id: SegmentId,
    /// Monotonic position within the owning source
    pub sequence: u64,
    /// Covered slice of the event timeline
    pub time_range: TimeRange,
    /// Duration in seconds
    pub duration: TimeSec,
    /// Storage URI of the media itself
    pub uri: String,
    /// Motion was detected in this segment
    pub has_motion: bool,
    /// Audio was detected in this segment
    pub has_audio: bool,
    /// Curated moment this segment belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moment_id: Option<MomentId>,
}

impl Segment {
    /// Creates a new segment with a generated ID
    pub fn new(sequence: u64, time_range: TimeRange, uri: &str) -> Self {
        let duration = time_range.duration();
        Self {
            id: ulid::Ulid::new().to_string(),
            sequence,
            time_range,
            duration,
            uri: uri.to_string(),
            has_motion: false,
            has_audio: false,
            moment_id: None,
        }
    }
}

// =============================================================================
// Time Index
// =============================================================================

/// Per-source index of segments sorted by capture sequence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeIndex {
    /// Schema version
    pub version: String,
    /// Segments in ascending `sequence` order
    pub segments: Vec<Segment>,
}

impl TimeIndex {
    /// Builds an index from raw segments, sorting ascending by sequence.
    pub fn from_segments(mut segments: Vec<Segment>) -> Self {
        segments.sort_by_key(|s| s.sequence);
        Self {
            version: SCHEMA_VERSION.to_string(),
            segments,
        }
    }

    /// Returns every segment overlapping the half-open window
    /// `[start, end)`. A segment ending exactly at `start`, or starting
    /// exactly at `end`, is excluded.
    pub fn find_in_range(&self, start: TimeSec, end: TimeSec) -> Vec<&Segment> {
        self.segments
            .iter()
            .filter(|s| s.time_range.overlaps_half_open(start, end))
            .collect()
    }

    /// Looks up a segment by ID
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Total duration covered by all segments, in seconds
    pub fn total_duration(&self) -> TimeSec {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

// =============================================================================
// Tests
// =============================================================================
