//! Processed-state tracker
//!
//! Durable record of which archives have been extracted, stored as a single
//! JSON object in the same bucket as the archives:
//!
//! ```json
//! {
//!   "lastRunAt": "2024-03-01T02:00:00Z",
//!   "archives": [
//!     {
//!       "name": "orders1.zip",
//!       "contentHash": "9b2cf535f27731c974343645a3985328",
//!       "extractedAt": "2024-03-01T02:00:00Z",
//!       "files": [{ "name": "x.pdf", "sourceArchive": "orders1.zip" }]
//!     }
//!   ]
//! }
//! ```

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{ExtractError, Result, StoreError};
use crate::storage::ObjectStore;

/// One file found inside a processed archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub name: String,
    pub source_archive: String,
}

/// One processed archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub name: String,
    /// Store ETag at extraction time, kept for audit only
    pub content_hash: Option<String>,
    pub extracted_at: DateTime<Utc>,
    pub files: Vec<FileRecord>,
}

impl ArchiveRecord {
    /// Build a record whose file list points back at this archive
    pub fn new<I>(name: impl Into<String>, content_hash: Option<String>, file_names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let name = name.into();
        let files = file_names
            .into_iter()
            .map(|file| FileRecord {
                name: file,
                source_archive: name.clone(),
            })
            .collect();

        Self {
            name,
            content_hash,
            extracted_at: Utc::now(),
            files,
        }
    }
}

/// Full durable payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedState {
    pub last_run_at: DateTime<Utc>,
    #[serde(default)]
    pub archives: Vec<ArchiveRecord>,
}

impl ProcessedState {
    pub fn empty() -> Self {
        Self {
            last_run_at: Utc::now(),
            archives: Vec::new(),
        }
    }
}

/// Owns the processed state for the duration of a run
pub struct StateTracker {
    store: Arc<dyn ObjectStore>,
    key: String,
    state: ProcessedState,
    names: HashSet<String>,
    unflushed: usize,
}

impl StateTracker {
    /// Load the payload at `key`, or start empty when none exists yet
    #[instrument(skip(store))]
    pub async fn load(store: Arc<dyn ObjectStore>, key: &str) -> Result<Self> {
        let state = match store.get(key).await {
            Ok(payload) => decode(key, &payload)?,
            Err(StoreError::NotFound(_)) => {
                info!("No processed state at '{}', starting fresh", key);
                ProcessedState::empty()
            },
            Err(e) => return Err(e.into()),
        };

        let mut names = HashSet::with_capacity(state.archives.len());
        for record in &state.archives {
            if !names.insert(record.name.clone()) {
                return Err(ExtractError::StateCorrupt {
                    key: key.to_string(),
                    reason: format!("archive '{}' is recorded twice", record.name),
                });
            }
        }

        debug!(archives = names.len(), "Loaded processed state");

        Ok(Self {
            store,
            key: key.to_string(),
            state,
            names,
            unflushed: 0,
        })
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Append a record; a name that is already present is rejected
    pub fn record_archive(&mut self, record: ArchiveRecord) -> Result<()> {
        if !self.names.insert(record.name.clone()) {
            return Err(ExtractError::DuplicateArchive(record.name));
        }
        self.state.archives.push(record);
        self.unflushed += 1;
        Ok(())
    }

    /// Records appended since the last flush
    pub fn unflushed(&self) -> usize {
        self.unflushed
    }

    pub fn state(&self) -> &ProcessedState {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.state.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.archives.is_empty()
    }

    /// Stamp `lastRunAt` and overwrite the durable payload
    #[instrument(skip(self), fields(key = %self.key, archives = self.state.archives.len()))]
    pub async fn flush(&mut self) -> Result<()> {
        self.state.last_run_at = Utc::now();
        let payload = serde_json::to_vec_pretty(&self.state)?;

        self.store.put(&self.key, Bytes::from(payload)).await?;
        self.unflushed = 0;

        debug!("Flushed processed state");
        Ok(())
    }
}

fn decode(key: &str, payload: &[u8]) -> Result<ProcessedState> {
    serde_json::from_slice(payload).map_err(|e| ExtractError::StateCorrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const KEY: &str = "data/extractor-state.json";

    fn record(name: &str, files: &[&str]) -> ArchiveRecord {
        ArchiveRecord::new(
            name,
            Some("etag".to_string()),
            files.iter().map(|f| f.to_string()),
        )
    }

    #[tokio::test]
    async fn test_load_without_payload_is_empty() {
        let store = Arc::new(MemoryStore::new());
        let tracker = StateTracker::load(store, KEY).await.unwrap();
        assert!(tracker.is_empty());
        assert!(!tracker.is_processed("orders1.zip"));
    }

    #[tokio::test]
    async fn test_flush_then_load_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = StateTracker::load(store.clone(), KEY).await.unwrap();
        tracker
            .record_archive(record("orders1.zip", &["manifest.csv", "x.pdf"]))
            .unwrap();
        assert_eq!(tracker.unflushed(), 1);
        tracker.flush().await.unwrap();
        assert_eq!(tracker.unflushed(), 0);

        let reloaded = StateTracker::load(store, KEY).await.unwrap();
        assert!(reloaded.is_processed("orders1.zip"));
        assert_eq!(reloaded.state(), tracker.state());
        assert_eq!(reloaded.state().archives[0].files[1].source_archive, "orders1.zip");
    }

    #[tokio::test]
    async fn test_payload_uses_camel_case() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = StateTracker::load(store.clone(), KEY).await.unwrap();
        tracker.record_archive(record("a.zip", &["x.pdf"])).unwrap();
        tracker.flush().await.unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&store.object(KEY).unwrap()).unwrap();
        assert!(json.get("lastRunAt").is_some());
        let archive = &json["archives"][0];
        assert_eq!(archive["contentHash"], "etag");
        assert!(archive.get("extractedAt").is_some());
        assert_eq!(archive["files"][0]["sourceArchive"], "a.zip");
    }

    #[tokio::test]
    async fn test_duplicate_archive_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = StateTracker::load(store, KEY).await.unwrap();
        tracker.record_archive(record("orders1.zip", &[])).unwrap();

        let err = tracker
            .record_archive(record("orders1.zip", &["x.pdf"]))
            .unwrap_err();
        assert!(matches!(err, ExtractError::DuplicateArchive(name) if name == "orders1.zip"));
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_corrupt() {
        let store = Arc::new(MemoryStore::new());
        store.insert(KEY, "{ not json");

        let err = StateTracker::load(store, KEY).await.err().unwrap();
        assert!(matches!(err, ExtractError::StateCorrupt { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_names_in_payload_are_corrupt() {
        let state = ProcessedState {
            last_run_at: Utc::now(),
            archives: vec![record("a.zip", &[]), record("a.zip", &[])],
        };
        let store = Arc::new(MemoryStore::new());
        store.insert(KEY, serde_json::to_vec(&state).unwrap());

        let err = StateTracker::load(store, KEY).await.err().unwrap();
        assert!(matches!(err, ExtractError::StateCorrupt { reason, .. } if reason.contains("a.zip")));
    }
}
