//! Object-store abstraction used by the pipeline
//!
//! The pipeline only needs a handful of operations: list, get, exists, put and
//! delete, plus a cheap prefix probe.
//! [`S3Store`] talks to S3/MinIO, [`MemoryStore`] keeps everything in process.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

pub mod config;
pub mod memory;
pub mod s3;

pub use config::StorageConfig;
pub use memory::MemoryStore;
pub use s3::S3Store;

/// One listed object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    /// Entity tag reported by the store, without surrounding quotes
    pub etag: Option<String>,
    pub size: u64,
}

/// Remote object store consumed by the pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object, optionally restricted to a key prefix
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectSummary>, StoreError>;

    /// Read a whole object; `StoreError::NotFound` when absent
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// True when at least one object key starts with `prefix`
    async fn has_prefix(&self, prefix: &str) -> Result<bool, StoreError> {
        Ok(!self.list(Some(prefix)).await?.is_empty())
    }

    /// Create or overwrite an object
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Remove an object; absent keys are not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Strip the quotes S3 wraps around ETags
pub(crate) fn normalize_etag(raw: &str) -> String {
    raw.trim_matches('"').to_string()
}
