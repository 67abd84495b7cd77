//! Person Index
//!
//! Aggregates raw appearance records into per-person entities for one
//! source, and provides the pure transforms used for cross-source
//! views: confidence filtering and multi-index merge.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::filters::{BloomFilter, CountMinSketch};
use crate::index::SCHEMA_VERSION;
use crate::{CoreResult, PersonId, SegmentId, TimeRange, TimeSec};

// =============================================================================
// Appearance Models
// =============================================================================

/// Raw appearance record as emitted by an upstream detector
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceRecord {
    /// Detected person
    pub person_id: PersonId,
    /// Segment the appearance was detected in
    pub segment_id: SegmentId,
    /// Time span of the appearance on the event timeline
    pub time_range: TimeRange,
    /// Number of frames the person was visible in
    pub frame_count: u64,
    /// Average detection confidence (0.0 - 1.0)
    pub confidence_avg: f64,
    /// Minimum detection confidence (0.0 - 1.0)
    pub confidence_min: f64,
}

/// One aggregated appearance inside a person entity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    pub segment_id: SegmentId,
    pub time_range: TimeRange,
    pub frame_count: u64,
    pub confidence_avg: f64,
    pub confidence_min: f64,
}

// =============================================================================
// Person Entity
// =============================================================================

/// An indexed identity with aggregated appearance records
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonEntity {
    pub person_id: PersonId,
    /// Earliest appearance start on the event timeline
    pub first_seen: TimeSec,
    /// Latest appearance end on the event timeline
    pub last_seen: TimeSec,
    pub total_frames: u64,
    pub total_duration_seconds: f64,
    /// Appearances in input order
    pub appearances: Vec<Appearance>,
}

impl PersonEntity {
    fn from_record(record: &AppearanceRecord) -> Self {
        Self {
            person_id: record.person_id.clone(),
            first_seen: record.time_range.start,
            last_seen: record.time_range.end,
            total_frames: 0,
            total_duration_seconds: 0.0,
            appearances: Vec::new(),
        }
    }

    fn push_record(&mut self, record: AppearanceRecord) {
        self.total_frames += record.frame_count;
        self.total_duration_seconds += record.time_range.duration();
        self.first_seen = self.first_seen.min(record.time_range.start);
        self.last_seen = self.last_seen.max(record.time_range.end);
        self.appearances.push(Appearance {
            segment_id: record.segment_id,
            time_range: record.time_range,
            frame_count: record.frame_count,
            confidence_avg: record.confidence_avg,
            confidence_min: record.confidence_min,
        });
    }

    /// Rebuilds an entity's aggregates from a retained appearance list.
    fn from_appearances(person_id: &str, appearances: Vec<Appearance>) -> Self {
        let mut first_seen = f64::INFINITY;
        let mut last_seen = f64::NEG_INFINITY;
        let mut total_frames = 0u64;
        let mut total_duration = 0.0;

        for app in &appearances {
            first_seen = first_seen.min(app.time_range.start);
            last_seen = last_seen.max(app.time_range.end);
            total_frames += app.frame_count;
            total_duration += app.time_range.duration();
        }

        Self {
            person_id: person_id.to_string(),
            first_seen,
            last_seen,
            total_frames,
            total_duration_seconds: total_duration,
            appearances,
        }
    }
}

// =============================================================================
// Index Stats
// =============================================================================

/// Summary statistics carried by person and moment indexes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Number of distinct entity ids
    pub unique_entities: usize,
    /// Sum of per-entity appearance-list lengths (additive, not
    /// deduplicated across sources)
    pub total_appearances: usize,
}

// =============================================================================
// Person Index
// =============================================================================

/// Per-source index of person entities keyed by person id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonIndex {
    /// Schema version
    pub version: String,
    /// Entities keyed by person id
    pub entities: BTreeMap<PersonId, PersonEntity>,
    /// Summary statistics over `entities`
    pub stats: IndexStats,
}

impl PersonIndex {
    /// Builds an index by grouping raw appearance records by person id.
    ///
    /// Appearance order within each entity follows input order.
    pub fn build(records: Vec<AppearanceRecord>) -> Self {
        let mut entities: BTreeMap<PersonId, PersonEntity> = BTreeMap::new();

        for record in records {
            entities
                .entry(record.person_id.clone())
                .or_insert_with(|| PersonEntity::from_record(&record))
                .push_record(record);
        }

        let stats = compute_stats(&entities);
        Self {
            version: SCHEMA_VERSION.to_string(),
            entities,
            stats,
        }
    }

    /// Looks up an entity by person id
    pub fn get(&self, person_id: &str) -> Option<&PersonEntity> {
        self.entities.get(person_id)
    }

    /// Returns a new index retaining only appearances with
    /// `confidence_avg >= threshold`.
    ///
    /// Per-entity aggregates and stats are recomputed from the retained
    /// set; entities left with no appearances are dropped. The input is
    /// never mutated.
    pub fn filter_by_confidence(&self, threshold: f64) -> Self {
        let mut entities = BTreeMap::new();

        for (person_id, entity) in &self.entities {
            let retained: Vec<Appearance> = entity
                .appearances
                .iter()
                .filter(|a| a.confidence_avg >= threshold)
                .cloned()
                .collect();

            if retained.is_empty() {
                continue;
            }
            entities.insert(
                person_id.clone(),
                PersonEntity::from_appearances(person_id, retained),
            );
        }

        let stats = compute_stats(&entities);
        Self {
            version: SCHEMA_VERSION.to_string(),
            entities,
            stats,
        }
    }

    /// Unions entities by person id across per-source indexes.
    ///
    /// Appearances are concatenated in index order, seen bounds extend
    /// to the overall min/max, and frame/duration totals sum. Stats are
    /// recomputed over the merged map, so `unique_entities` can be
    /// smaller than the sum of per-source unique counts.
    pub fn merge(indexes: &[PersonIndex]) -> Self {
        let mut entities: BTreeMap<PersonId, PersonEntity> = BTreeMap::new();

        for index in indexes {
            for (person_id, entity) in &index.entities {
                match entities.get_mut(person_id) {
                    Some(merged) => {
                        merged.appearances.extend(entity.appearances.iter().cloned());
                        merged.first_seen = merged.first_seen.min(entity.first_seen);
                        merged.last_seen = merged.last_seen.max(entity.last_seen);
                        merged.total_frames += entity.total_frames;
                        merged.total_duration_seconds += entity.total_duration_seconds;
                    }
                    None => {
                        entities.insert(person_id.clone(), entity.clone());
                    }
                }
            }
        }

        let stats = compute_stats(&entities);
        Self {
            version: SCHEMA_VERSION.to_string(),
            entities,
            stats,
        }
    }

    /// Builds the membership bloom filter over this index's person ids.
    pub fn bloom(&self, false_positive_rate: f64) -> CoreResult<BloomFilter> {
        let mut filter = BloomFilter::new(self.entities.len().max(1), false_positive_rate)?;
        for person_id in self.entities.keys() {
            filter.add(person_id.as_bytes());
        }
        Ok(filter)
    }

    /// Builds an appearance-frequency sketch over this index's person ids.
    pub fn sketch(&self, width: u32, depth: u32) -> CoreResult<CountMinSketch> {
        let mut sketch = CountMinSketch::new(width, depth)?;
        for (person_id, entity) in &self.entities {
            let count = u32::try_from(entity.appearances.len()).unwrap_or(u32::MAX);
            sketch.add(person_id.as_bytes(), count);
        }
        Ok(sketch)
    }
}

impl Default for PersonIndex {
    fn default() -> Self {
        Self::build(Vec::new())
    }
}

fn compute_stats(entities: &BTreeMap<PersonId, PersonEntity>) -> IndexStats {
    IndexStats {
        unique_entities: entities.len(),
        total_appearances: entities.values().map(|e| e.appearances.len()).sum(),
    }
}

// =============================================================================
// Tests
// =============================================================================
