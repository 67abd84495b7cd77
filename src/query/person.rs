//! Person Search
//!
//! "Find all appearances of person X" across every source, with bloom
//! pruning ahead of the index fan-out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::index::{PersonEntity, PersonIndex};
use crate::manifest::keys::{self, BloomKind, IndexKind};
use crate::query::{elapsed_ms, fetch_json, ClipResult, PersonSearchResult, SearchEngine};
use crate::{CoreError, CoreResult};

impl SearchEngine {
    /// Answers "where does this person appear" for one wedding.
    ///
    /// Returns an empty aggregate when the global bloom filter proves
    /// absence, the per-source matches otherwise, and `NotFound` when a
    /// full fan-out finds the person in no source.
    pub async fn search_person(
        &self,
        wedding_id: &str,
        person_id: &str,
    ) -> CoreResult<PersonSearchResult> {
        if wedding_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("weddingId is required".to_string()));
        }
        if person_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("personId is required".to_string()));
        }

        let started = Instant::now();

        // Stage 1: one global read can answer "definitely not here".
        if self
            .global_bloom_rejects(wedding_id, BloomKind::People, person_id)
            .await
        {
            debug!("Global bloom filter excludes person {}", person_id);
            return Ok(PersonSearchResult::empty(person_id, elapsed_ms(started)));
        }

        // Stage 2: the manifest enumerates every source.
        let manifest = self.wedding_manifest(wedding_id).await?;

        // Stage 3: per-source bloom pruning.
        let candidates = self
            .prune_sources(wedding_id, &manifest.sources, BloomKind::People, person_id)
            .await;

        // Stage 4: fetch surviving person indexes and look the entity up.
        let mut handles = Vec::with_capacity(candidates.len());
        for entry in &candidates {
            let storage = Arc::clone(&self.storage);
            let key = keys::source_index(wedding_id, &entry.source_id, IndexKind::People);
            let person = person_id.to_string();

            handles.push(tokio::spawn(async move {
                let index: PersonIndex = match fetch_json(storage.as_ref(), &key).await {
                    Ok(Some(index)) => index,
                    Ok(None) => {
                        debug!("No person index at {}", key);
                        return None;
                    }
                    Err(e) => {
                        warn!("Skipping unreadable person index at {}: {}", key, e);
                        return None;
                    }
                };
                // A miss here is a bloom false positive: silent skip.
                index.get(&person).cloned()
            }));
        }

        let mut matches: HashMap<String, PersonEntity> = HashMap::new();
        for (entry, handle) in candidates.iter().zip(handles) {
            if let Ok(Some(entity)) = handle.await {
                matches.insert(entry.source_id.clone(), entity);
            }
        }

        if matches.is_empty() {
            return Err(CoreError::NotFound(format!(
                "Person not found: {}",
                person_id
            )));
        }

        // Stages 5-6: assemble clips in the manifest's declared source
        // order for deterministic output.
        let mut clips = Vec::new();
        let mut total_duration = 0.0;
        for entry in &manifest.sources {
            let Some(entity) = matches.get(&entry.source_id) else {
                continue;
            };
            for appearance in &entity.appearances {
                let duration = appearance.time_range.duration();
                total_duration += duration;
                clips.push(ClipResult {
                    source_id: entry.source_id.clone(),
                    segment_id: appearance.segment_id.clone(),
                    time_range: appearance.time_range.clone(),
                    duration_seconds: duration,
                    playback_url: self.urls.resolve(&entry.source_id, &appearance.segment_id),
                    frame_count: Some(appearance.frame_count),
                    confidence: Some(appearance.confidence_avg),
                });
            }
        }

        let result = PersonSearchResult {
            person_id: person_id.to_string(),
            total_clips: clips.len(),
            total_duration_seconds: total_duration,
            clips,
            elapsed_ms: elapsed_ms(started),
        };
        info!(
            "Person search for {} matched {} clips across {} sources in {}ms",
            person_id,
            result.total_clips,
            matches.len(),
            result.elapsed_ms
        );
        Ok(result)
    }
}

// =============================================================================
// Tests
// =============================================================================
