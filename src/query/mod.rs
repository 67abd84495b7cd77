//! Query Orchestrator Module
//!
//! Stateless scatter-gather search over the hierarchical index: global
//! bloom filter first, then the wedding manifest, then concurrent
//! per-source bloom pruning and index fetches. Failures scoped to a
//! single source degrade to a skip; only a missing wedding manifest or
//! invalid query parameters are terminal.

pub mod moment;
pub mod person;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::filters::BloomFilter;
use crate::manifest::keys::{self, BloomKind};
use crate::manifest::{SourceEntry, WeddingManifest};
use crate::storage::StorageClient;
use crate::{CoreError, CoreResult, MomentId, PersonId, SegmentId, SourceId, TimeRange, TimeSec};

// =============================================================================
// Playback URL Resolution
// =============================================================================

/// External collaborator producing a playable URL for a segment.
///
/// The engine never signs or mints playback URLs itself.
pub trait PlaybackUrlResolver: Send + Sync {
    fn resolve(&self, source_id: &str, segment_id: &str) -> String;
}

// =============================================================================
// Result Types
// =============================================================================

/// One playable clip in a search result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipResult {
    pub source_id: SourceId,
    pub segment_id: SegmentId,
    pub time_range: TimeRange,
    pub duration_seconds: TimeSec,
    /// Opaque playable URL from the injected resolver
    pub playback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Aggregated person search response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSearchResult {
    pub person_id: PersonId,
    pub total_clips: usize,
    pub total_duration_seconds: TimeSec,
    pub clips: Vec<ClipResult>,
    /// Wall-clock time spent answering, for observability
    pub elapsed_ms: u64,
}

impl PersonSearchResult {
    pub(crate) fn empty(person_id: &str, elapsed_ms: u64) -> Self {
        Self {
            person_id: person_id.to_string(),
            total_clips: 0,
            total_duration_seconds: 0.0,
            clips: Vec::new(),
            elapsed_ms,
        }
    }
}

/// Aggregated moment search response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentSearchResult {
    pub moment_id: MomentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub total_clips: usize,
    pub total_duration_seconds: TimeSec,
    pub clips: Vec<ClipResult>,
    /// Wall-clock time spent answering, for observability
    pub elapsed_ms: u64,
}

impl MomentSearchResult {
    pub(crate) fn empty(moment_id: &str, elapsed_ms: u64) -> Self {
        Self {
            moment_id: moment_id.to_string(),
            name: None,
            total_clips: 0,
            total_duration_seconds: 0.0,
            clips: Vec::new(),
            elapsed_ms,
        }
    }
}

// =============================================================================
// Search Engine
// =============================================================================

/// Person and moment search over an injected storage client
pub struct SearchEngine {
    pub(crate) storage: Arc<dyn StorageClient>,
    pub(crate) urls: Arc<dyn PlaybackUrlResolver>,
}

impl SearchEngine {
    pub fn new(storage: Arc<dyn StorageClient>, urls: Arc<dyn PlaybackUrlResolver>) -> Self {
        Self { storage, urls }
    }

    /// Fetches the wedding manifest; absence is terminal `NotFound`.
    pub(crate) async fn wedding_manifest(&self, wedding_id: &str) -> CoreResult<WeddingManifest> {
        fetch_json(self.storage.as_ref(), &keys::wedding_manifest(wedding_id))
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Wedding manifest not found: {}", wedding_id)))
    }

    /// Checks the global-scope bloom filter for a definite negative.
    ///
    /// A missing or unreadable global bloom means "cannot prune", never
    /// an error.
    pub(crate) async fn global_bloom_rejects(
        &self,
        wedding_id: &str,
        kind: BloomKind,
        entity_id: &str,
    ) -> bool {
        let key = keys::global_bloom(wedding_id, kind);
        match self.storage.get(&key).await {
            Ok(Some(bytes)) => match BloomFilter::from_bytes(&bytes) {
                Ok(bloom) => !bloom.might_contain(entity_id.as_bytes()),
                Err(e) => {
                    warn!("Unreadable global bloom at {}: {}", key, e);
                    false
                }
            },
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read global bloom at {}: {}", key, e);
                false
            }
        }
    }

    /// Concurrently checks every source's bloom filter, dropping sources
    /// with a definite negative. One task per source, joined before
    /// returning; manifest order is preserved in the output.
    pub(crate) async fn prune_sources(
        &self,
        wedding_id: &str,
        sources: &[SourceEntry],
        kind: BloomKind,
        entity_id: &str,
    ) -> Vec<SourceEntry> {
        let mut handles = Vec::with_capacity(sources.len());

        for entry in sources {
            let storage = Arc::clone(&self.storage);
            let key = keys::source_bloom(wedding_id, &entry.source_id, kind);
            let entity = entity_id.to_string();

            handles.push(tokio::spawn(async move {
                match storage.get(&key).await {
                    Ok(Some(bytes)) => match BloomFilter::from_bytes(&bytes) {
                        Ok(bloom) => bloom.might_contain(entity.as_bytes()),
                        Err(e) => {
                            warn!("Unreadable source bloom at {}: {}", key, e);
                            true
                        }
                    },
                    // No bloom object: cannot prune, keep the source.
                    Ok(None) => true,
                    Err(e) => {
                        warn!("Failed to read source bloom at {}: {}", key, e);
                        true
                    }
                }
            }));
        }

        let mut kept = Vec::new();
        for (entry, handle) in sources.iter().zip(handles) {
            let keep = handle.await.unwrap_or(true);
            if keep {
                kept.push(entry.clone());
            } else {
                debug!("Source {} pruned by bloom filter", entry.source_id);
            }
        }
        kept
    }
}

// =============================================================================
// Fetch Helpers
// =============================================================================

/// Fetches and parses a JSON object. Absent keys are `None`; bytes that
/// fail to parse are `CorruptData`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    storage: &dyn StorageClient,
    key: &str,
) -> CoreResult<Option<T>> {
    match storage.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CoreError::CorruptData(format!("invalid JSON at {}: {}", key, e))),
        None => Ok(None),
    }
}

pub(crate) fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
