//! In-memory storage backend.
//!
//! Stores all data in a `BTreeMap` behind a `RwLock`. Nothing survives the
//! process. Clones share the same map, which lets tests simulate a restart by
//! building a second registry over a clone of the first backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{StorageBackend, StorageError};

/// An in-memory storage backend backed by a `BTreeMap`.
///
/// # Examples
///
/// ```
/// # use bountyhub_storage::{MemoryBackend, StorageBackend};
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// backend.put("api_keys", b"{}").await.unwrap();
/// let val = backend.get("api_keys").await.unwrap();
/// assert_eq!(val, Some(b"{}".to_vec()));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StorageError> {
        let mut data = self.data.write().await;
        if data.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        data.insert(key.to_owned(), new.to_vec());
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let backend = MemoryBackend::new();
        let result = backend.get("api_keys").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn put_overwrites_existing() {
        let backend = MemoryBackend::new();
        backend.put("api_keys", b"v1").await.unwrap();
        backend.put("api_keys", b"v2").await.unwrap();
        let val = backend.get("api_keys").await.unwrap();
        assert_eq!(val, Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn cas_on_missing_key_requires_none() {
        let backend = MemoryBackend::new();
        assert!(!backend.compare_and_swap("k", Some(b"x"), b"v1").await.unwrap());
        assert!(backend.compare_and_swap("k", None, b"v1").await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v1".to_vec()));
    }

    #[tokio::test]
    async fn cas_rejects_stale_expectation() {
        let backend = MemoryBackend::new();
        backend.put("k", b"v1").await.unwrap();
        backend.put("k", b"v2").await.unwrap();

        let swapped = backend.compare_and_swap("k", Some(b"v1"), b"v3").await.unwrap();
        assert!(!swapped);
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v2".to_vec()));

        let swapped = backend.compare_and_swap("k", Some(b"v2"), b"v3").await.unwrap();
        assert!(swapped);
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v3".to_vec()));
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend.put("key", b"val").await.unwrap();
        let val = clone.get("key").await.unwrap();
        assert_eq!(val, Some(b"val".to_vec()));
    }
}
