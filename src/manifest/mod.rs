//! Manifest Layer
//!
//! Typed, versioned JSON descriptors binding storage keys to structured
//! metadata at each level of the hierarchy: wedding, source, segment,
//! and the cross-source global moment view. Manifests are built offline,
//! written once per version, and read many times as immutable snapshots;
//! the query path never mutates them.

pub mod keys;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::index::{Segment, SCHEMA_VERSION};
use crate::{CoreResult, MomentId, PersonId, SegmentId, SourceId, TimeRange, TimeSec, WeddingId};

// =============================================================================
// Wedding Manifest
// =============================================================================

/// Top-level descriptor enumerating every source in a wedding namespace
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeddingManifest {
    /// Schema version
    pub version: String,
    pub wedding_id: WeddingId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Sources in declared order; queries assemble results in this order
    pub sources: Vec<SourceEntry>,
}

/// One source as listed in the wedding manifest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub source_id: SourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub segment_count: usize,
}

impl WeddingManifest {
    pub fn new(wedding_id: &str, name: Option<&str>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            wedding_id: wedding_id.to_string(),
            name: name.map(|n| n.to_string()),
            created_at: chrono::Utc::now().to_rfc3339(),
            sources: Vec::new(),
        }
    }
}

// =============================================================================
// Source Manifest
// =============================================================================

/// Descriptor for one independent capture stream ("videographer")
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceManifest {
    /// Schema version
    pub version: String,
    pub wedding_id: WeddingId,
    pub source_id: SourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub segment_count: usize,
    pub total_duration_seconds: TimeSec,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

// =============================================================================
// Segment Manifest
// =============================================================================

/// Descriptor binding a storage key to one segment's metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentManifest {
    /// Schema version
    pub version: String,
    pub wedding_id: WeddingId,
    pub source_id: SourceId,
    pub segment: Segment,
}

// =============================================================================
// Global Moment
// =============================================================================

/// Precomputed cross-source moment descriptor.
///
/// When present, moment search returns these multi-angle clips directly
/// instead of scanning every source's moment index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMoment {
    /// Schema version
    pub version: String,
    pub moment_id: MomentId,
    pub name: String,
    pub moment_type: String,
    /// Widest window covered across all sources
    pub time_range: TimeRange,
    pub duration: TimeSec,
    /// One clip per (source, segment) covering the moment
    pub clips: Vec<MomentClip>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people_featured: Option<Vec<PersonId>>,
    pub tags: Vec<String>,
}

/// One multi-angle clip inside a global moment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentClip {
    pub source_id: SourceId,
    pub segment_id: SegmentId,
    pub time_range: TimeRange,
}

// =============================================================================
// JSON Helpers
// =============================================================================

/// Serializes any manifest to its stored JSON form
pub fn to_json<T: Serialize>(manifest: &T) -> CoreResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(manifest)?)
}

/// Deserializes a manifest from stored JSON bytes
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// =============================================================================
// Tests
// =============================================================================
