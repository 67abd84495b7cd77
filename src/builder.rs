//! Index Builder
//!
//! Offline construction pipeline: raw per-source inputs in, a complete
//! versioned snapshot out. Builds every per-source index, derives the
//! bloom filters and frequency sketches from them, rolls the global
//! cross-source views, and publishes the whole namespace through an
//! injected storage client. The query path never runs any of this.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::filters::{BloomFilter, CountMinSketch};
use crate::index::{
    AppearanceRecord, MomentEntity, MomentIndex, PersonIndex, Segment, TimeIndex,
    DEFAULT_FP_RATE, SCHEMA_VERSION,
};
use crate::manifest::keys::{self, BloomKind, IndexKind};
use crate::manifest::{
    to_json, GlobalMoment, MomentClip, SegmentManifest, SourceEntry, SourceManifest,
    WeddingManifest,
};
use crate::storage::StorageClient;
use crate::{CoreError, CoreResult, MomentId, SourceId, WeddingId};

/// Appearance-frequency sketch dimensions, sized for a few thousand
/// distinct people per source at roughly 1% relative error.
const SKETCH_WIDTH: u32 = 256;
const SKETCH_DEPTH: u32 = 4;

// =============================================================================
// Source Input
// =============================================================================

/// Raw material for one source: captured segments plus the detector and
/// curator outputs for them.
#[derive(Clone, Debug, Default)]
pub struct SourceInput {
    pub source_id: SourceId,
    pub name: Option<String>,
    pub segments: Vec<Segment>,
    pub appearances: Vec<AppearanceRecord>,
    pub moments: Vec<MomentEntity>,
}

impl SourceInput {
    pub fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn with_appearance(mut self, record: AppearanceRecord) -> Self {
        self.appearances.push(record);
        self
    }

    pub fn with_moment(mut self, moment: MomentEntity) -> Self {
        self.moments.push(moment);
        self
    }
}

// =============================================================================
// Built Artifacts
// =============================================================================

/// Everything built for one source, ready to publish
#[derive(Clone, Debug)]
pub struct BuiltSource {
    pub manifest: SourceManifest,
    pub time_index: TimeIndex,
    pub person_index: PersonIndex,
    pub moment_index: MomentIndex,
    pub people_bloom: BloomFilter,
    pub moments_bloom: BloomFilter,
    pub appearance_sketch: CountMinSketch,
}

/// A complete wedding snapshot: per-source artifacts plus the global
/// cross-source views derived from them.
#[derive(Clone, Debug)]
pub struct BuiltIndex {
    pub manifest: WeddingManifest,
    pub sources: Vec<BuiltSource>,
    pub global_people_bloom: BloomFilter,
    pub global_moments_bloom: BloomFilter,
    pub global_moments: Vec<GlobalMoment>,
}

impl BuiltIndex {
    /// Total number of objects `publish` will write
    pub fn object_count(&self) -> usize {
        let per_source: usize = self
            .sources
            .iter()
            // manifest + 3 indexes + 2 blooms + sketch + one manifest
            // per segment
            .map(|s| 7 + s.time_index.segments.len())
            .sum();
        1 + 2 + self.global_moments.len() + per_source
    }

    /// Writes every object in the snapshot at its namespace key.
    ///
    /// Keys are written once per snapshot version; an existing object at
    /// a key is overwritten with a warning. Returns the number of
    /// objects written.
    pub async fn publish(&self, storage: &dyn StorageClient) -> CoreResult<usize> {
        let wedding_id = &self.manifest.wedding_id;
        let mut written = 0usize;

        put_once(
            storage,
            &keys::wedding_manifest(wedding_id),
            to_json(&self.manifest)?,
            &mut written,
        )
        .await?;

        put_once(
            storage,
            &keys::global_bloom(wedding_id, BloomKind::People),
            self.global_people_bloom.to_bytes(),
            &mut written,
        )
        .await?;
        put_once(
            storage,
            &keys::global_bloom(wedding_id, BloomKind::Moments),
            self.global_moments_bloom.to_bytes(),
            &mut written,
        )
        .await?;

        for global in &self.global_moments {
            put_once(
                storage,
                &keys::global_moment(wedding_id, &global.moment_id),
                to_json(global)?,
                &mut written,
            )
            .await?;
        }

        for source in &self.sources {
            let source_id = &source.manifest.source_id;

            put_once(
                storage,
                &keys::source_manifest(wedding_id, source_id),
                to_json(&source.manifest)?,
                &mut written,
            )
            .await?;

            put_once(
                storage,
                &keys::source_index(wedding_id, source_id, IndexKind::Time),
                to_json(&source.time_index)?,
                &mut written,
            )
            .await?;
            put_once(
                storage,
                &keys::source_index(wedding_id, source_id, IndexKind::People),
                to_json(&source.person_index)?,
                &mut written,
            )
            .await?;
            put_once(
                storage,
                &keys::source_index(wedding_id, source_id, IndexKind::Moments),
                to_json(&source.moment_index)?,
                &mut written,
            )
            .await?;

            put_once(
                storage,
                &keys::source_bloom(wedding_id, source_id, BloomKind::People),
                source.people_bloom.to_bytes(),
                &mut written,
            )
            .await?;
            put_once(
                storage,
                &keys::source_bloom(wedding_id, source_id, BloomKind::Moments),
                source.moments_bloom.to_bytes(),
                &mut written,
            )
            .await?;

            put_once(
                storage,
                &keys::source_sketch(wedding_id, source_id),
                source.appearance_sketch.to_bytes(),
                &mut written,
            )
            .await?;

            for segment in &source.time_index.segments {
                let manifest = SegmentManifest {
                    version: SCHEMA_VERSION.to_string(),
                    wedding_id: wedding_id.clone(),
                    source_id: source_id.clone(),
                    segment: segment.clone(),
                };
                put_once(
                    storage,
                    &keys::segment_manifest(wedding_id, source_id, &segment.id),
                    to_json(&manifest)?,
                    &mut written,
                )
                .await?;
            }
        }

        info!(
            "Published {} objects for wedding {}",
            written, self.manifest.wedding_id
        );
        Ok(written)
    }
}

async fn put_once(
    storage: &dyn StorageClient,
    key: &str,
    bytes: Vec<u8>,
    written: &mut usize,
) -> CoreResult<()> {
    if storage.exists(key).await? {
        warn!("Overwriting existing object at {}", key);
    }
    storage.put(key, bytes).await?;
    *written += 1;
    Ok(())
}

// =============================================================================
// Index Builder
// =============================================================================

/// Accumulates per-source inputs and builds a publishable snapshot
pub struct IndexBuilder {
    wedding_id: WeddingId,
    name: Option<String>,
    false_positive_rate: f64,
    sources: Vec<SourceInput>,
}

impl IndexBuilder {
    pub fn new(wedding_id: &str, name: Option<&str>) -> Self {
        Self {
            wedding_id: wedding_id.to_string(),
            name: name.map(|n| n.to_string()),
            false_positive_rate: DEFAULT_FP_RATE,
            sources: Vec::new(),
        }
    }

    /// Overrides the bloom filter false-positive rate
    pub fn with_false_positive_rate(mut self, rate: f64) -> Self {
        self.false_positive_rate = rate;
        self
    }

    /// Adds one source's inputs. Source order here is the declared order
    /// queries assemble results in.
    pub fn add_source(mut self, input: SourceInput) -> Self {
        self.sources.push(input);
        self
    }

    /// Builds the full snapshot: per-source indexes and filters, then
    /// the global views rolled up from them.
    pub fn build(self) -> CoreResult<BuiltIndex> {
        if self.wedding_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("weddingId is required".to_string()));
        }

        let mut manifest = WeddingManifest::new(&self.wedding_id, self.name.as_deref());
        let mut built_sources = Vec::with_capacity(self.sources.len());

        for input in self.sources {
            if input.source_id.trim().is_empty() {
                return Err(CoreError::InvalidInput("sourceId is required".to_string()));
            }
            if manifest
                .sources
                .iter()
                .any(|s| s.source_id == input.source_id)
            {
                return Err(CoreError::InvalidInput(format!(
                    "Duplicate source: {}",
                    input.source_id
                )));
            }

            let time_index = TimeIndex::from_segments(input.segments);
            let person_index = PersonIndex::build(input.appearances);
            let moment_index = MomentIndex::build(input.moments);

            let people_bloom = person_index.bloom(self.false_positive_rate)?;
            let moments_bloom = moment_index.bloom(self.false_positive_rate)?;
            let appearance_sketch = person_index.sketch(SKETCH_WIDTH, SKETCH_DEPTH)?;

            debug!(
                "Built source {}: {} segments, {} people, {} moments",
                input.source_id,
                time_index.segments.len(),
                person_index.stats.unique_entities,
                moment_index.stats.unique_entities
            );

            manifest.sources.push(SourceEntry {
                source_id: input.source_id.clone(),
                name: input.name.clone(),
                segment_count: time_index.segments.len(),
            });

            built_sources.push(BuiltSource {
                manifest: SourceManifest {
                    version: SCHEMA_VERSION.to_string(),
                    wedding_id: self.wedding_id.clone(),
                    source_id: input.source_id,
                    name: input.name,
                    segment_count: time_index.segments.len(),
                    total_duration_seconds: time_index.total_duration(),
                    created_at: manifest.created_at.clone(),
                },
                time_index,
                person_index,
                moment_index,
                people_bloom,
                moments_bloom,
                appearance_sketch,
            });
        }

        // Global people bloom is rebuilt over the merged index rather
        // than merged bitwise, so per-source filters keep independent
        // dimensions.
        let per_source_people: Vec<PersonIndex> = built_sources
            .iter()
            .map(|s| s.person_index.clone())
            .collect();
        let global_people = PersonIndex::merge(&per_source_people);
        let global_people_bloom = global_people.bloom(self.false_positive_rate)?;

        let global_moments = roll_up_moments(&built_sources);
        let mut global_moments_bloom =
            BloomFilter::new(global_moments.len().max(1), self.false_positive_rate)?;
        for global in &global_moments {
            global_moments_bloom.add(global.moment_id.as_bytes());
        }

        Ok(BuiltIndex {
            manifest,
            sources: built_sources,
            global_people_bloom,
            global_moments_bloom,
            global_moments,
        })
    }
}

/// Groups moment entities by id across sources into multi-angle
/// descriptors: widest covered window, one clip per (source, segment),
/// unioned featured people and tags.
fn roll_up_moments(sources: &[BuiltSource]) -> Vec<GlobalMoment> {
    let mut grouped: BTreeMap<MomentId, GlobalMoment> = BTreeMap::new();

    for source in sources {
        for entity in source.moment_index.moments.values() {
            let clips = entity.segments.iter().map(|segment_id| MomentClip {
                source_id: source.manifest.source_id.clone(),
                segment_id: segment_id.clone(),
                time_range: entity.time_range.clone(),
            });

            match grouped.entry(entity.moment_id.clone()) {
                Entry::Occupied(mut occupied) => {
                    let global = occupied.get_mut();
                    global.time_range.extend(&entity.time_range);
                    global.duration = global.time_range.duration();
                    global.clips.extend(clips);
                    union_people(&mut global.people_featured, &entity.people_featured);
                    union_tags(&mut global.tags, &entity.tags);
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(GlobalMoment {
                        version: SCHEMA_VERSION.to_string(),
                        moment_id: entity.moment_id.clone(),
                        name: entity.name.clone(),
                        moment_type: entity.moment_type.clone(),
                        time_range: entity.time_range.clone(),
                        duration: entity.time_range.duration(),
                        clips: clips.collect(),
                        people_featured: entity.people_featured.clone(),
                        tags: entity.tags.clone(),
                    });
                }
            }
        }
    }

    grouped.into_values().collect()
}

/// Unions featured people, keeping the untagged/tagged distinction:
/// `None` only when no source tagged anyone.
fn union_people(into: &mut Option<Vec<String>>, from: &Option<Vec<String>>) {
    let Some(from) = from else {
        return;
    };
    let people = into.get_or_insert_with(Vec::new);
    for person in from {
        if !people.contains(person) {
            people.push(person.clone());
        }
    }
}

fn union_tags(into: &mut Vec<String>, from: &[String]) {
    for tag in from {
        if !into.contains(tag) {
            into.push(tag.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::query::{PlaybackUrlResolver, SearchEngine};
    use crate::storage::MemoryStorage;
    use crate::TimeRange;

    struct TestResolver;

    impl PlaybackUrlResolver for TestResolver {
        fn resolve(&self, source_id: &str, segment_id: &str) -> String {
            format!("https://cdn.test/{}/{}/master.m3u8", source_id, segment_id)
        }
    }

    fn segment(id: &str, sequence: u64, start: f64, end: f64) -> Segment {
        Segment {
            id: id.to_string(),
            sequence,
            time_range: TimeRange::new(start, end),
            duration: end - start,
            uri: format!("media/{}.ts", id),
            has_motion: true,
            has_audio: true,
            moment_id: None,
        }
    }

    fn appearance(person_id: &str, segment_id: &str, start: f64, end: f64) -> AppearanceRecord {
        AppearanceRecord {
            person_id: person_id.to_string(),
            segment_id: segment_id.to_string(),
            time_range: TimeRange::new(start, end),
            frame_count: 60,
            confidence_avg: 0.92,
            confidence_min: 0.85,
        }
    }

    fn fixture() -> IndexBuilder {
        IndexBuilder::new("w1", Some("Smith Wedding"))
            .with_false_positive_rate(0.001)
            .add_source(
                SourceInput::new("main")
                    .with_name("Main Camera")
                    .with_segment(segment("m_1", 0, 0.0, 10.0))
                    .with_segment(segment("m_2", 1, 10.0, 20.0))
                    .with_appearance(appearance("alice", "m_1", 2.0, 8.0))
                    .with_appearance(appearance("bob", "m_2", 11.0, 14.0))
                    .with_moment(
                        MomentEntity::new("vows", "Vows", "ceremony", TimeRange::new(2.0, 18.0))
                            .with_segment("m_1")
                            .with_segment("m_2")
                            .with_person("alice")
                            .with_tag("ceremony"),
                    ),
            )
            .add_source(
                SourceInput::new("roaming")
                    .with_segment(segment("r_1", 0, 0.0, 10.0))
                    .with_appearance(appearance("alice", "r_1", 3.0, 7.0))
                    .with_moment(
                        MomentEntity::new("vows", "Vows", "ceremony", TimeRange::new(1.0, 19.0))
                            .with_segment("r_1")
                            .with_person("bob"),
                    ),
            )
    }

    // -------------------------------------------------------------------------
    // Build Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_build_rejects_bad_inputs() {
        assert!(matches!(
            IndexBuilder::new("", None).build(),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            IndexBuilder::new("w1", None)
                .add_source(SourceInput::new("cam"))
                .add_source(SourceInput::new("cam"))
                .build(),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_per_source_artifacts() {
        let built = fixture().build().unwrap();

        assert_eq!(built.manifest.sources.len(), 2);
        assert_eq!(built.manifest.sources[0].source_id, "main");
        assert_eq!(built.manifest.sources[0].segment_count, 2);

        let main = &built.sources[0];
        assert_eq!(main.manifest.total_duration_seconds, 20.0);
        assert!(main.people_bloom.might_contain(b"alice"));
        assert!(main.people_bloom.might_contain(b"bob"));
        assert!(main.moments_bloom.might_contain(b"vows"));
        assert!(main.appearance_sketch.estimate(b"alice") >= 1);

        let roaming = &built.sources[1];
        assert!(roaming.people_bloom.might_contain(b"alice"));
    }

    #[test]
    fn test_build_global_views() {
        let built = fixture().build().unwrap();

        assert!(built.global_people_bloom.might_contain(b"alice"));
        assert!(built.global_people_bloom.might_contain(b"bob"));
        assert!(built.global_moments_bloom.might_contain(b"vows"));

        assert_eq!(built.global_moments.len(), 1);
        let vows = &built.global_moments[0];
        assert_eq!(vows.name, "Vows");
        // Widest window across both sources.
        assert_eq!(vows.time_range, TimeRange::new(1.0, 19.0));
        assert_eq!(vows.duration, 18.0);
        // One clip per (source, segment), in source order.
        let clip_ids: Vec<_> = vows
            .clips
            .iter()
            .map(|c| (c.source_id.as_str(), c.segment_id.as_str()))
            .collect();
        assert_eq!(
            clip_ids,
            vec![("main", "m_1"), ("main", "m_2"), ("roaming", "r_1")]
        );
        // Featured people unioned across sources.
        assert_eq!(
            vows.people_featured,
            Some(vec!["alice".to_string(), "bob".to_string()])
        );
        assert_eq!(vows.tags, vec!["ceremony".to_string()]);
    }

    #[test]
    fn test_untagged_moments_stay_untagged() {
        let built = IndexBuilder::new("w1", None)
            .add_source(SourceInput::new("cam").with_moment(MomentEntity::new(
                "toasts",
                "Toasts",
                "reception",
                TimeRange::new(0.0, 10.0),
            )))
            .build()
            .unwrap();

        assert_eq!(built.global_moments[0].people_featured, None);
    }

    // -------------------------------------------------------------------------
    // Publish Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_publish_writes_full_namespace() {
        let built = fixture().build().unwrap();
        let storage = MemoryStorage::new();

        let written = built.publish(&storage).await.unwrap();
        assert_eq!(written, built.object_count());
        assert_eq!(storage.len().await, written);

        let keys = storage.keys().await;
        assert!(keys.contains(&"w1/manifest.json".to_string()));
        assert!(keys.contains(&"w1/global/bloom/people.bloom".to_string()));
        assert!(keys.contains(&"w1/global/bloom/moments.bloom".to_string()));
        assert!(keys.contains(&"w1/global/moments/vows.json".to_string()));
        assert!(keys.contains(&"w1/videographers/main/manifest.json".to_string()));
        assert!(keys.contains(&"w1/videographers/main/indexes/time.json".to_string()));
        assert!(keys.contains(&"w1/videographers/main/indexes/people.json".to_string()));
        assert!(keys.contains(&"w1/videographers/main/indexes/moments.json".to_string()));
        assert!(keys.contains(&"w1/videographers/main/bloom/people.bloom".to_string()));
        assert!(keys.contains(&"w1/videographers/main/sketch/appearances.cms".to_string()));
        assert!(keys.contains(&"w1/videographers/main/segments/m_1.json".to_string()));
        assert!(keys.contains(&"w1/videographers/roaming/segments/r_1.json".to_string()));
    }

    #[tokio::test]
    async fn test_generated_segment_ids_flow_to_manifests() {
        let seg = Segment::new(0, TimeRange::new(0.0, 6.0), "media/gen_0.ts");
        let id = seg.id.clone();

        let built = IndexBuilder::new("w2", None)
            .add_source(SourceInput::new("cam").with_segment(seg))
            .build()
            .unwrap();
        let storage = MemoryStorage::new();
        built.publish(&storage).await.unwrap();

        assert!(storage
            .keys()
            .await
            .contains(&keys::segment_manifest("w2", "cam", &id)));
    }

    #[tokio::test]
    async fn test_republish_overwrites_in_place() {
        let built = fixture().build().unwrap();
        let storage = MemoryStorage::new();

        built.publish(&storage).await.unwrap();
        let before = storage.len().await;
        built.publish(&storage).await.unwrap();

        // Same keys, no duplicates.
        assert_eq!(storage.len().await, before);
    }

    // -------------------------------------------------------------------------
    // End-To-End Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_published_snapshot_answers_person_search() {
        let built = fixture().build().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        built.publish(storage.as_ref()).await.unwrap();

        let engine = SearchEngine::new(storage, Arc::new(TestResolver));
        let result = engine.search_person("w1", "alice").await.unwrap();

        assert_eq!(result.total_clips, 2);
        let sources: Vec<_> = result.clips.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(sources, vec!["main", "roaming"]);
        assert_eq!(
            result.clips[0].playback_url,
            "https://cdn.test/main/m_1/master.m3u8"
        );

        // Only the main camera saw bob.
        let result = engine.search_person("w1", "bob").await.unwrap();
        assert_eq!(result.total_clips, 1);
        assert_eq!(result.clips[0].source_id, "main");

        // Absent person: global bloom answers with an empty result.
        let result = engine.search_person("w1", "nobody").await.unwrap();
        assert_eq!(result.total_clips, 0);
    }

    #[tokio::test]
    async fn test_published_snapshot_answers_moment_search() {
        let built = fixture().build().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        built.publish(storage.as_ref()).await.unwrap();

        let engine = SearchEngine::new(storage, Arc::new(TestResolver));
        let result = engine.search_moment("w1", "vows").await.unwrap();

        // Served from the published global descriptor.
        assert_eq!(result.name.as_deref(), Some("Vows"));
        assert_eq!(result.total_clips, 3);
        let sources: Vec<_> = result.clips.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(sources, vec!["main", "main", "roaming"]);
    }
}
