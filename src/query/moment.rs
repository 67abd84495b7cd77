//! Moment Search
//!
//! "Find every angle of moment Y". Prefers the precomputed cross-source
//! global moment descriptor; falls back to scanning each source's
//! moment index when no descriptor exists.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::index::{MomentEntity, MomentIndex};
use crate::manifest::keys::{self, BloomKind, IndexKind};
use crate::manifest::GlobalMoment;
use crate::query::{elapsed_ms, fetch_json, ClipResult, MomentSearchResult, SearchEngine};
use crate::{CoreError, CoreResult};

impl SearchEngine {
    /// Answers "where is this moment captured" for one wedding.
    pub async fn search_moment(
        &self,
        wedding_id: &str,
        moment_id: &str,
    ) -> CoreResult<MomentSearchResult> {
        if wedding_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("weddingId is required".to_string()));
        }
        if moment_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("momentId is required".to_string()));
        }

        let started = Instant::now();

        // Stage 1: one global read can answer "definitely not here".
        if self
            .global_bloom_rejects(wedding_id, BloomKind::Moments, moment_id)
            .await
        {
            debug!("Global bloom filter excludes moment {}", moment_id);
            return Ok(MomentSearchResult::empty(moment_id, elapsed_ms(started)));
        }

        // Stage 2: the manifest enumerates every source.
        let manifest = self.wedding_manifest(wedding_id).await?;

        // Preferred path: the precomputed multi-angle descriptor.
        let global_key = keys::global_moment(wedding_id, moment_id);
        match fetch_json::<GlobalMoment>(self.storage.as_ref(), &global_key).await {
            Ok(Some(global)) => {
                let mut clips = Vec::with_capacity(global.clips.len());
                let mut total_duration = 0.0;
                for clip in &global.clips {
                    let duration = clip.time_range.duration();
                    total_duration += duration;
                    clips.push(ClipResult {
                        source_id: clip.source_id.clone(),
                        segment_id: clip.segment_id.clone(),
                        time_range: clip.time_range.clone(),
                        duration_seconds: duration,
                        playback_url: self.urls.resolve(&clip.source_id, &clip.segment_id),
                        frame_count: None,
                        confidence: None,
                    });
                }

                let result = MomentSearchResult {
                    moment_id: moment_id.to_string(),
                    name: Some(global.name),
                    total_clips: clips.len(),
                    total_duration_seconds: total_duration,
                    clips,
                    elapsed_ms: elapsed_ms(started),
                };
                info!(
                    "Moment search for {} answered from global descriptor ({} angles) in {}ms",
                    moment_id, result.total_clips, result.elapsed_ms
                );
                return Ok(result);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    "Unreadable global moment at {}, falling back to source scan: {}",
                    global_key, e
                );
            }
        }

        // Fallback: stage 3 bloom pruning, stage 4 moment index fan-out.
        let candidates = self
            .prune_sources(wedding_id, &manifest.sources, BloomKind::Moments, moment_id)
            .await;

        let mut handles = Vec::with_capacity(candidates.len());
        for entry in &candidates {
            let storage = Arc::clone(&self.storage);
            let key = keys::source_index(wedding_id, &entry.source_id, IndexKind::Moments);
            let moment = moment_id.to_string();

            handles.push(tokio::spawn(async move {
                let index: MomentIndex = match fetch_json(storage.as_ref(), &key).await {
                    Ok(Some(index)) => index,
                    Ok(None) => {
                        debug!("No moment index at {}", key);
                        return None;
                    }
                    Err(e) => {
                        warn!("Skipping unreadable moment index at {}: {}", key, e);
                        return None;
                    }
                };
                index.get(&moment).cloned()
            }));
        }

        let mut matches: HashMap<String, MomentEntity> = HashMap::new();
        for (entry, handle) in candidates.iter().zip(handles) {
            if let Ok(Some(entity)) = handle.await {
                matches.insert(entry.source_id.clone(), entity);
            }
        }

        if matches.is_empty() {
            return Err(CoreError::NotFound(format!(
                "Moment not found: {}",
                moment_id
            )));
        }

        // Stages 5-6: assemble clips in the manifest's declared source
        // order for deterministic output.
        let mut name = None;
        let mut clips = Vec::new();
        let mut total_duration = 0.0;
        for entry in &manifest.sources {
            let Some(entity) = matches.get(&entry.source_id) else {
                continue;
            };
            if name.is_none() {
                name = Some(entity.name.clone());
            }
            for segment_id in &entity.segments {
                total_duration += entity.duration;
                clips.push(ClipResult {
                    source_id: entry.source_id.clone(),
                    segment_id: segment_id.clone(),
                    time_range: entity.time_range.clone(),
                    duration_seconds: entity.duration,
                    playback_url: self.urls.resolve(&entry.source_id, segment_id),
                    frame_count: None,
                    confidence: None,
                });
            }
        }

        let result = MomentSearchResult {
            moment_id: moment_id.to_string(),
            name,
            total_clips: clips.len(),
            total_duration_seconds: total_duration,
            clips,
            elapsed_ms: elapsed_ms(started),
        };
        info!(
            "Moment search for {} matched {} clips across {} sources in {}ms",
            moment_id,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SCHEMA_VERSION;
    use crate::manifest::{to_json, MomentClip, SourceEntry, WeddingManifest};
    use crate::query::PlaybackUrlResolver;
    use crate::storage::{MemoryStorage, StorageClient};
    use crate::TimeRange;

    struct TestResolver;

    impl PlaybackUrlResolver for TestResolver {
        fn resolve(&self, source_id: &str, segment_id: &str) -> String {
            format!("https://cdn.test/{}/{}/master.m3u8", source_id, segment_id)
        }
    }

    fn moment(id: &str, name: &str, start: f64, end: f64, segments: &[&str]) -> MomentEntity {
        let mut entity = MomentEntity::new(id, name, "reception", TimeRange::new(start, end));
        for segment in segments {
            entity = entity.with_segment(segment);
        }
        entity
    }

    async fn seed_wedding(storage: &MemoryStorage) {
        let mut manifest = WeddingManifest::new("w1", None);
        for (id, count) in [("main", 3), ("roaming", 2)] {
            manifest.sources.push(SourceEntry {
                source_id: id.to_string(),
                name: None,
                segment_count: count,
            });
        }
        storage
            .put("w1/manifest.json", to_json(&manifest).unwrap())
            .await
            .unwrap();

        let main_index = MomentIndex::build(vec![
            moment("first_dance", "First Dance", 300.0, 420.0, &["m_31", "m_32"]),
            moment("vows", "Vows", 100.0, 160.0, &["m_10"]),
        ]);
        let roaming_index = MomentIndex::build(vec![moment(
            "first_dance",
            "First Dance",
            305.0,
            415.0,
            &["r_17"],
        )]);

        for (source_id, index) in [("main", &main_index), ("roaming", &roaming_index)] {
            storage
                .put(
                    &keys::source_index("w1", source_id, IndexKind::Moments),
                    to_json(index).unwrap(),
                )
                .await
                .unwrap();
            storage
                .put(
                    &keys::source_bloom("w1", source_id, BloomKind::Moments),
                    index.bloom(0.001).unwrap().to_bytes(),
                )
                .await
                .unwrap();
        }

        let mut global_bloom = crate::filters::BloomFilter::new(4, 0.001).unwrap();
        global_bloom.add(b"first_dance");
        global_bloom.add(b"vows");
        storage
            .put(
                &keys::global_bloom("w1", BloomKind::Moments),
                global_bloom.to_bytes(),
            )
            .await
            .unwrap();
    }

    fn engine(storage: Arc<dyn StorageClient>) -> SearchEngine {
        SearchEngine::new(storage, Arc::new(TestResolver))
    }

    #[tokio::test]
    async fn test_missing_parameters_rejected() {
        let engine = engine(Arc::new(MemoryStorage::new()));
        assert!(matches!(
            engine.search_moment("", "vows").await,
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.search_moment("w1", "").await,
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_global_bloom_negative_is_empty_result() {
        let storage = MemoryStorage::new();
        seed_wedding(&storage).await;

        let engine = engine(Arc::new(storage));
        let result = engine.search_moment("w1", "moment_unknown").await.unwrap();
        assert_eq!(result.total_clips, 0);
    }

    #[tokio::test]
    async fn test_absent_manifest_is_not_found() {
        let engine = engine(Arc::new(MemoryStorage::new()));
        let result = engine.search_moment("w_missing", "vows").await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_global_descriptor_preferred() {
        let storage = MemoryStorage::new();
        seed_wedding(&storage).await;

        let global = GlobalMoment {
            version: SCHEMA_VERSION.to_string(),
            moment_id: "first_dance".to_string(),
            name: "First Dance".to_string(),
            moment_type: "reception".to_string(),
            time_range: TimeRange::new(300.0, 420.0),
            duration: 120.0,
            clips: vec![
                MomentClip {
                    source_id: "main".to_string(),
                    segment_id: "m_31".to_string(),
                    time_range: TimeRange::new(300.0, 420.0),
                },
                MomentClip {
                    source_id: "roaming".to_string(),
                    segment_id: "r_17".to_string(),
                    time_range: TimeRange::new(305.0, 415.0),
                },
            ],
            people_featured: None,
            tags: Vec::new(),
        };
        storage
            .put(
                &keys::global_moment("w1", "first_dance"),
                to_json(&global).unwrap(),
            )
            .await
            .unwrap();

        let engine = engine(Arc::new(storage));
        let result = engine.search_moment("w1", "first_dance").await.unwrap();

        assert_eq!(result.name.as_deref(), Some("First Dance"));
        assert_eq!(result.total_clips, 2);
        assert_eq!(result.clips[0].segment_id, "m_31");
        assert_eq!(result.clips[1].segment_id, "r_17");
        assert!((result.total_duration_seconds - 230.0).abs() < 1e-9);
        assert_eq!(
            result.clips[1].playback_url,
            "https://cdn.test/roaming/r_17/master.m3u8"
        );
    }

    #[tokio::test]
    async fn test_fallback_scans_sources_in_manifest_order() {
        let storage = MemoryStorage::new();
        seed_wedding(&storage).await;

        let engine = engine(Arc::new(storage));
        let result = engine.search_moment("w1", "first_dance").await.unwrap();

        assert_eq!(result.name.as_deref(), Some("First Dance"));
        assert_eq!(result.total_clips, 3);
        let sources: Vec<_> = result.clips.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(sources, vec!["main", "main", "roaming"]);
        // Two main clips at 120s plus one roaming clip at 110s.
        assert!((result.total_duration_seconds - 350.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fallback_prunes_sources_without_moment() {
        let storage = MemoryStorage::new();
        seed_wedding(&storage).await;

        let engine = engine(Arc::new(storage));
        let result = engine.search_moment("w1", "vows").await.unwrap();

        // Only the main camera captured the vows.
        assert_eq!(result.total_clips, 1);
        assert_eq!(result.clips[0].source_id, "main");
        assert_eq!(result.clips[0].segment_id, "m_10");
    }

    #[tokio::test]
    async fn test_corrupt_global_descriptor_falls_back() {
        let storage = MemoryStorage::new();
        seed_wedding(&storage).await;
        storage
            .put(&keys::global_moment("w1", "first_dance"), b"{oops".to_vec())
            .await
            .unwrap();

        let engine = engine(Arc::new(storage));
        let result = engine.search_moment("w1", "first_dance").await.unwrap();
        assert_eq!(result.total_clips, 3);
    }

    #[tokio::test]
    async fn test_bloom_false_positive_without_entity_is_not_found() {
        let storage = MemoryStorage::new();
        seed_wedding(&storage).await;
        // Global and source blooms claim the moment exists; no index has it.
        let mut bloom = crate::filters::BloomFilter::new(4, 0.001).unwrap();
        bloom.add(b"cake_cutting");
        storage
            .put(
                &keys::global_bloom("w1", BloomKind::Moments),
                bloom.to_bytes(),
            )
            .await
            .unwrap();
        for source in ["main", "roaming"] {
            storage
                .put(
                    &keys::source_bloom("w1", source, BloomKind::Moments),
                    bloom.to_bytes(),
                )
                .await
                .unwrap();
        }

        let engine = engine(Arc::new(storage));
        let result = engine.search_moment("w1", "cake_cutting").await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }
}
