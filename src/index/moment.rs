//! Moment Index
//!
//! Pass-through mapping of authored moment records. Moments are curated
//! time windows of interest; unlike person entities they are never
//! aggregated from raw signals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::filters::BloomFilter;
use crate::index::{IndexStats, SCHEMA_VERSION};
use crate::{CoreResult, MomentId, PersonId, SegmentId, TimeRange, TimeSec};

// =============================================================================
// Moment Entity
// =============================================================================

/// A curated, named time window of interest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentEntity {
    pub moment_id: MomentId,
    /// Display name (e.g. "First Dance")
    pub name: String,
    /// Moment category (e.g. "ceremony", "reception")
    pub moment_type: String,
    pub time_range: TimeRange,
    /// Duration in seconds
    pub duration: TimeSec,
    /// Segments covering this moment, in timeline order
    pub segments: Vec<SegmentId>,
    /// People curated as featured in this moment; `None` means the
    /// curator never tagged anyone, as opposed to an explicit empty list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people_featured: Option<Vec<PersonId>>,
    pub tags: Vec<String>,
}

impl MomentEntity {
    /// Creates a new moment over the given window
    pub fn new(moment_id: &str, name: &str, moment_type: &str, time_range: TimeRange) -> Self {
        let duration = time_range.duration();
        Self {
            moment_id: moment_id.to_string(),
            name: name.to_string(),
            moment_type: moment_type.to_string(),
            time_range,
            duration,
            segments: Vec::new(),
            people_featured: None,
            tags: Vec::new(),
        }
    }

    /// Adds a covered segment
    pub fn with_segment(mut self, segment_id: &str) -> Self {
        self.segments.push(segment_id.to_string());
        self
    }

    /// Tags a featured person
    pub fn with_person(mut self, person_id: &str) -> Self {
        self.people_featured
            .get_or_insert_with(Vec::new)
            .push(person_id.to_string());
        self
    }

    /// Adds a free-form tag
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }
}

// =============================================================================
// Moment Index
// =============================================================================

/// Per-source index of authored moments keyed by moment id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentIndex {
    /// Schema version
    pub version: String,
    /// Moments keyed by moment id
    pub moments: BTreeMap<MomentId, MomentEntity>,
    /// Summary statistics over `moments`
    pub stats: IndexStats,
}

impl MomentIndex {
    /// Builds an index from authored moment records. No aggregation
    /// step: records map through keyed by id.
    pub fn build(moments: Vec<MomentEntity>) -> Self {
        let moments: BTreeMap<MomentId, MomentEntity> = moments
            .into_iter()
            .map(|m| (m.moment_id.clone(), m))
            .collect();

        let stats = IndexStats {
            unique_entities: moments.len(),
            total_appearances: moments.values().map(|m| m.segments.len()).sum(),
        };

        Self {
            version: SCHEMA_VERSION.to_string(),
            moments,
            stats,
        }
    }

    /// Looks up a moment by id
    pub fn get(&self, moment_id: &str) -> Option<&MomentEntity> {
        self.moments.get(moment_id)
    }

    /// Builds the membership bloom filter over this index's moment ids.
    pub fn bloom(&self, false_positive_rate: f64) -> CoreResult<BloomFilter> {
        let mut filter = BloomFilter::new(self.moments.len().max(1), false_positive_rate)?;
        for moment_id in self.moments.keys() {
            filter.add(moment_id.as_bytes());
        }
        Ok(filter)
    }
}

impl Default for MomentIndex {
    fn default() -> Self {
        Self::build(Vec::new())
    }
}

// =============================================================================
// Tests
// =============================================================================
