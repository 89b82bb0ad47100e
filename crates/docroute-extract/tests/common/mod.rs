//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use docroute_extract::{MemoryStore, ObjectStore, ObjectSummary, StoreError};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

/// Build an in-memory zip from `(path, content)` pairs
pub fn build_zip(entries: &[(&str, &str)]) -> Bytes {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    Bytes::from(writer.finish().unwrap().into_inner())
}

/// Manifest text with the default `~` layout
pub fn manifest(rows: &[(&str, &str)]) -> String {
    let mut text = String::from("PO Number~Vendor~Attachment List\n");
    for (po, attachments) in rows {
        text.push_str(&format!("{}~Acme~{}\n", po, attachments));
    }
    text
}

/// Store wrapper that fails selected operations
///
/// `put` fails for keys containing `fail_put_containing`, `get` fails for the
/// exact key `fail_get`.
#[derive(Clone, Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_put_containing: Option<String>,
    pub fail_get: Option<String>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_put_containing(mut self, fragment: &str) -> Self {
        self.fail_put_containing = Some(fragment.to_string());
        self
    }

    pub fn fail_get(mut self, key: &str) -> Self {
        self.fail_get = Some(key.to_string());
        self
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectSummary>, StoreError> {
        self.inner.list(prefix).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        if self.fail_get.as_deref() == Some(key) {
            return Err(StoreError::backend("get", key, anyhow::anyhow!("injected failure")));
        }
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        if let Some(fragment) = &self.fail_put_containing {
            if key.contains(fragment.as_str()) {
                return Err(StoreError::backend("put", key, anyhow::anyhow!("injected failure")));
            }
        }
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }
}
