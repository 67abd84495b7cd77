//! Storage Client Module
//!
//! Abstraction over the object store holding manifests, indexes, and
//! filters. The engine only needs "bytes or absent" reads against
//! immutable, versioned snapshots; retry and backoff policy belongs to
//! the implementor. Clients are injected into the orchestrator and the
//! index builder, never reached through global state.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::CoreResult;

// =============================================================================
// Storage Client Trait
// =============================================================================

/// Read/write access to the index object namespace.
///
/// The query path uses only `get` and `exists`; `put` exists for the
/// offline index builder.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Fetches an object's bytes, or `None` if the key is absent
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>>;

    /// Checks whether a key exists
    async fn exists(&self, key: &str) -> CoreResult<bool>;

    /// Writes an object (index construction only)
    async fn put(&self, key: &str, bytes: Vec<u8>) -> CoreResult<()>;
}

// =============================================================================
// In-Memory Storage
// =============================================================================

/// HashMap-backed storage for tests and local index construction
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// All stored keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn exists(&self, key: &str) -> CoreResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> CoreResult<()> {
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let storage = MemoryStorage::new();
        storage.put("w1/manifest.json", b"{}".to_vec()).await.unwrap();

        assert_eq!(
            storage.get("w1/manifest.json").await.unwrap(),
            Some(b"{}".to_vec())
        );
        assert!(storage.exists("w1/manifest.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_absent_key() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("missing").await.unwrap(), None);
        assert!(!storage.exists("missing").await.unwrap());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_keys_sorted() {
        let storage = MemoryStorage::new();
        storage.put("b", vec![1]).await.unwrap();
        storage.put("a", vec![2]).await.unwrap();

        assert_eq!(storage.keys().await, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(storage.len().await, 2);
    }
}
