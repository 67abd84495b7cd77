//! Storage Key Namespace
//!
//! Hierarchical string keys rooted at `{wedding_id}/`, branching into
//! `videographers/{source_id}/...` for per-source objects and
//! `global/...` for cross-source objects. These are the only keys the
//! engine ever reads or writes.

use std::fmt;

// =============================================================================
// Object Kinds
// =============================================================================

/// Entity family a bloom filter covers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BloomKind {
    People,
    Moments,
}

impl BloomKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloomKind::People => "people",
            BloomKind::Moments => "moments",
        }
    }
}

impl fmt::Display for BloomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-source content index kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKind {
    Time,
    People,
    Moments,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Time => "time",
            IndexKind::People => "people",
            IndexKind::Moments => "moments",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Key Builders
// =============================================================================

/// Top-level wedding manifest key
pub fn wedding_manifest(wedding_id: &str) -> String {
    format!("{}/manifest.json", wedding_id)
}

/// Global-scope bloom filter key
pub fn global_bloom(wedding_id: &str, kind: BloomKind) -> String {
    format!("{}/global/bloom/{}.bloom", wedding_id, kind)
}

/// Precomputed cross-source moment descriptor key
pub fn global_moment(wedding_id: &str, moment_id: &str) -> String {
    format!("{}/global/moments/{}.json", wedding_id, moment_id)
}

/// Per-source manifest key
pub fn source_manifest(wedding_id: &str, source_id: &str) -> String {
    format!("{}/videographers/{}/manifest.json", wedding_id, source_id)
}

/// Per-source bloom filter key
pub fn source_bloom(wedding_id: &str, source_id: &str, kind: BloomKind) -> String {
    format!(
        "{}/videographers/{}/bloom/{}.bloom",
        wedding_id, source_id, kind
    )
}

/// Per-source content index key
pub fn source_index(wedding_id: &str, source_id: &str, kind: IndexKind) -> String {
    format!(
        "{}/videographers/{}/indexes/{}.json",
        wedding_id, source_id, kind
    )
}

/// Per-source appearance-frequency sketch key
pub fn source_sketch(wedding_id: &str, source_id: &str) -> String {
    format!(
        "{}/videographers/{}/sketch/appearances.cms",
        wedding_id, source_id
    )
}

/// Per-segment manifest key
pub fn segment_manifest(wedding_id: &str, source_id: &str, segment_id: &str) -> String {
    format!(
        "{}/videographers/{}/segments/{}.json",
        wedding_id, source_id, segment_id
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(wedding_manifest("w1"), "w1/manifest.json");
        assert_eq!(
            global_bloom("w1", BloomKind::People),
            "w1/global/bloom/people.bloom"
        );
        assert_eq!(
            global_moment("w1", "first_dance"),
            "w1/global/moments/first_dance.json"
        );
        assert_eq!(
            source_manifest("w1", "cam_a"),
            "w1/videographers/cam_a/manifest.json"
        );
        assert_eq!(
            source_bloom("w1", "cam_a", BloomKind::Moments),
            "w1/videographers/cam_a/bloom/moments.bloom"
        );
        assert_eq!(
            source_index("w1", "cam_a", IndexKind::Time),
            "w1/videographers/cam_a/indexes/time.json"
        );
        assert_eq!(
            source_sketch("w1", "cam_a"),
            "w1/videographers/cam_a/sketch/appearances.cms"
        );
        assert_eq!(
            segment_manifest("w1", "cam_a", "seg_9"),
            "w1/videographers/cam_a/segments/seg_9.json"
        );
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(BloomKind::People.to_string(), "people");
        assert_eq!(BloomKind::Moments.to_string(), "moments");
        assert_eq!(IndexKind::Time.to_string(), "time");
        assert_eq!(IndexKind::People.to_string(), "people");
        assert_eq!(IndexKind::Moments.to_string(), "moments");
    }
}
