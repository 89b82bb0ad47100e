//! In-memory object store for tests and dry runs.
//!
//! Thread-safe via `RwLock`. ETags are the SHA-256 of the content, so rewriting
//! identical bytes yields the same tag. Every `put` is also appended to a write
//! log, which lets tests count uploads even when a key is overwritten.

use async_trait::async_trait;
use bytes::Bytes;
use docroute_common::checksum::sha256_hex;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::{ObjectStore, ObjectSummary};
use crate::error::StoreError;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
    writes: Arc<RwLock<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording it as a write
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(key.into(), data.into());
        }
    }

    /// Current content of a key
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().ok()?.get(key).cloned()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Keys passed to `put`, in call order (duplicates kept)
    pub fn writes(&self) -> Vec<String> {
        self.writes.read().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn clear_writes(&self) {
        if let Ok(mut writes) = self.writes.write() {
            writes.clear();
        }
    }
}

fn poisoned(operation: &'static str, key: &str) -> StoreError {
    StoreError::backend(operation, key, anyhow::anyhow!("lock poisoned"))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectSummary>, StoreError> {
        let prefix = prefix.unwrap_or("");
        let objects = self.objects.read().map_err(|_| poisoned("list", prefix))?;

        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectSummary {
                key: key.clone(),
                etag: Some(sha256_hex(data)),
                size: data.len() as u64,
            })
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let objects = self.objects.read().map_err(|_| poisoned("get", key))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let objects = self.objects.read().map_err(|_| poisoned("head", key))?;
        Ok(objects.contains_key(key))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        self.objects
            .write()
            .map_err(|_| poisoned("put", key))?
            .insert(key.to_string(), data);
        self.writes
            .write()
            .map_err(|_| poisoned("put", key))?
            .push(key.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects
            .write()
            .map_err(|_| poisoned("delete", key))?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("by-po/PO1/a.pdf", Bytes::from_static(b"%PDF"))
            .await
            .expect("put should succeed");

        let data = store.get("by-po/PO1/a.pdf").await.expect("get should succeed");
        assert_eq!(data, Bytes::from_static(b"%PDF"));
        assert_eq!(store.writes(), vec!["by-po/PO1/a.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(key) if key == "missing"));
    }

    #[tokio::test]
    async fn test_list_prefix_and_etag() {
        let store = MemoryStore::new();
        store.insert("orders1.zip", "zip-bytes");
        store.insert("by-po/PO1/a.pdf", "pdf");

        let all = store.list(None).await.expect("list should succeed");
        assert_eq!(all.len(), 2);

        let routed = store.list(Some("by-po/")).await.expect("list should succeed");
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].key, "by-po/PO1/a.pdf");
        assert_eq!(routed[0].etag.as_deref(), Some(sha256_hex(b"pdf").as_str()));
        assert_eq!(routed[0].size, 3);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.insert("a", "1");
        store.delete("a").await.expect("delete should succeed");
        store.delete("a").await.expect("second delete should succeed");
        assert!(!store.exists("a").await.expect("exists should succeed"));
        assert!(store.writes().is_empty());
    }
}
