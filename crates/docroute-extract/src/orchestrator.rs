// Archive extraction orchestrator
//
// Discovers archives in the bucket, skips the ones already recorded in the
// processed state, and unpacks the rest with bounded concurrency using
// buffer_unordered. Workers hand back an ArchiveRecord; only the draining loop
// below touches the StateTracker.

use bytes::Bytes;
use docroute_common::checksum::sha256_hex;
use futures::stream::{self, FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::archive::{ArchiveEntry, ArchiveReader};
use crate::config::{ExtractorConfig, FlushPolicy};
use crate::error::{ExtractError, Result};
use crate::manifest::parse_manifest;
use crate::router::AttachmentRouter;
use crate::state::{ArchiveRecord, StateTracker};
use crate::storage::{ObjectStore, ObjectSummary};

/// Summary of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    /// Archive keys found in the bucket
    pub discovered: usize,
    /// Archives not yet recorded as processed
    pub new_archives: usize,
    /// Archives fully extracted and recorded during this run
    pub processed: usize,
    /// Archives whose extraction failed
    pub failed: usize,
    /// Objects written under the destination root
    pub uploads: usize,
    /// Attachments no manifest row referenced
    pub dropped_attachments: usize,
    /// Wall-clock time of the run
    pub duration_seconds: f64,
}

/// Result of extracting a single archive, before it is recorded
#[derive(Debug)]
struct ArchiveOutcome {
    record: ArchiveRecord,
    uploads: usize,
    dropped: usize,
}

pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    config: ExtractorConfig,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, config: ExtractorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Candidate archives in the bucket, sorted by key
    pub async fn discover(&self) -> Result<Vec<ObjectSummary>> {
        let mut archives: Vec<ObjectSummary> = self
            .store
            .list(None)
            .await?
            .into_iter()
            .filter(|obj| self.config.is_archive_key(&obj.key))
            .collect();

        archives.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(archives)
    }

    /// Extract every archive not yet processed
    ///
    /// With [`FlushPolicy::PerArchive`] the state is written after each archive and a
    /// failed archive does not stop the others. With [`FlushPolicy::EndOfRun`] the
    /// state is written once, and only if every archive succeeded. Either way the
    /// remaining archives drain before the first failure is returned.
    pub async fn run(&self) -> Result<RunResult> {
        self.config.validate()?;
        let start_time = Instant::now();

        info!(
            "Starting extraction run (concurrency={}, flush={})",
            self.config.archive_concurrency, self.config.flush_policy
        );

        // Step 1: Discover archives
        let archives = self.discover().await?;

        // Step 2: Filter out processed ones
        let mut tracker = StateTracker::load(Arc::clone(&self.store), &self.config.state_key).await?;
        let pending: Vec<ObjectSummary> = archives
            .iter()
            .filter(|obj| !tracker.is_processed(&obj.key))
            .cloned()
            .collect();

        let mut result = RunResult {
            discovered: archives.len(),
            new_archives: pending.len(),
            ..RunResult::default()
        };

        info!(
            "Found {} archives, {} not yet processed",
            result.discovered, result.new_archives
        );

        if pending.is_empty() {
            info!("Nothing to extract");
            result.duration_seconds = start_time.elapsed().as_secs_f64();
            return Ok(result);
        }

        // Step 3: Make sure the output locations exist
        self.ensure_prefix(&self.config.destination_prefix()).await?;
        if let Some(state_prefix) = self.config.state_prefix() {
            self.ensure_prefix(&state_prefix).await?;
        }

        // Step 4: Extract in parallel, merging results as they complete
        let total = pending.len();
        let mut outcomes = stream::iter(pending.into_iter().enumerate())
            .map(|(index, summary)| async move {
                let key = summary.key.clone();
                debug!("Starting archive {} ({} / {})", key, index + 1, total);
                let outcome = self.process_archive(summary).await;
                (key, outcome)
            })
            .buffer_unordered(self.config.archive_concurrency);

        let mut first_failure: Option<ExtractError> = None;

        while let Some((key, outcome)) = outcomes.next().await {
            match outcome {
                Ok(outcome) => {
                    info!(
                        "Extracted {}: {} uploads, {} dropped",
                        key, outcome.uploads, outcome.dropped
                    );
                    result.processed += 1;
                    result.uploads += outcome.uploads;
                    result.dropped_attachments += outcome.dropped;

                    tracker.record_archive(outcome.record)?;
                    if self.config.flush_policy == FlushPolicy::PerArchive {
                        tracker.flush().await?;
                    }
                },
                Err(e) => {
                    error!("Failed archive {}: {}", key, e);
                    result.failed += 1;

                    if first_failure.is_none() {
                        first_failure = Some(e.in_archive(key));
                    }
                },
            }
        }

        // Step 5: Flush whatever the loop has not; a failed end-of-run keeps nothing
        let discard = self.config.flush_policy == FlushPolicy::EndOfRun && first_failure.is_some();
        if tracker.unflushed() > 0 && !discard {
            tracker.flush().await?;
        }

        result.duration_seconds = start_time.elapsed().as_secs_f64();

        info!(
            "Run complete: {} processed, {} failed, {} uploads, {} dropped in {:.2}s",
            result.processed,
            result.failed,
            result.uploads,
            result.dropped_attachments,
            result.duration_seconds
        );

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(result),
        }
    }

    /// Write a zero-byte marker at `prefix` when nothing lives under it yet
    async fn ensure_prefix(&self, prefix: &str) -> Result<()> {
        if !self.store.has_prefix(prefix).await? {
            debug!("Creating prefix marker {}", prefix);
            self.store.put(prefix, Bytes::new()).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, summary), fields(archive = %summary.key))]
    async fn process_archive(&self, summary: ObjectSummary) -> Result<ArchiveOutcome> {
        let data = self.store.get(&summary.key).await?;
        let content_hash = summary.etag.clone().or_else(|| Some(sha256_hex(&data)));

        let mut reader = ArchiveReader::open(data)?;

        let manifest_entry = reader.manifest(&self.config.manifest_extension)?;
        let routing = parse_manifest(reader.open_entry(&manifest_entry)?, &self.config.manifest)?;
        debug!(
            "Manifest {} maps {} identifiers",
            manifest_entry.path,
            routing.len()
        );

        let router = AttachmentRouter::new(&routing, &self.config.destination_root);
        let attachments: Vec<ArchiveEntry> = reader
            .entries_with_extension(&self.config.attachment_extension)
            .cloned()
            .collect();

        let limit = self.config.upload_concurrency;
        let mut in_flight = FuturesUnordered::new();
        let mut uploads = 0usize;
        let mut dropped = 0usize;

        for entry in &attachments {
            let deliveries = router.route(&entry.name);
            if deliveries.is_empty() {
                warn!("No manifest row references {}, dropping it", entry.path);
                dropped += 1;
                continue;
            }

            let content = reader.read_entry(entry)?;

            for delivery in deliveries {
                while in_flight.len() >= limit {
                    if let Some(done) = in_flight.next().await {
                        done?;
                        uploads += 1;
                    }
                }

                let store = Arc::clone(&self.store);
                let content = content.clone();
                in_flight.push(async move {
                    store
                        .put(&delivery.key, content)
                        .await
                        .map_err(ExtractError::from)
                });
            }
        }

        while let Some(done) = in_flight.next().await {
            done?;
            uploads += 1;
        }

        let record = ArchiveRecord::new(
            summary.key,
            content_hash,
            reader.entries().iter().map(|entry| entry.name.clone()),
        );

        Ok(ArchiveOutcome {
            record,
            uploads,
            dropped,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_discover_ignores_routed_and_foreign_keys() {
        let store = MemoryStore::new();
        store.insert("b.zip", "b");
        store.insert("a.zip", "a");
        store.insert("notes.txt", "n");
        store.insert("by-po/PO1/nested.zip", "z");

        let orchestrator = Orchestrator::new(Arc::new(store), ExtractorConfig::default());
        let keys: Vec<_> = orchestrator
            .discover()
            .await
            .unwrap()
            .into_iter()
            .map(|obj| obj.key)
            .collect();

        assert_eq!(keys, vec!["a.zip", "b.zip"]);
    }

    #[tokio::test]
    async fn test_ensure_prefix_writes_marker_once() {
        let store = MemoryStore::new();
        let orchestrator = Orchestrator::new(Arc::new(store.clone()), ExtractorConfig::default());

        orchestrator.ensure_prefix("by-po/").await.unwrap();
        orchestrator.ensure_prefix("by-po/").await.unwrap();

        assert_eq!(store.writes(), vec!["by-po/".to_string()]);
        assert_eq!(store.object("by-po/").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_ensure_prefix_skips_populated_prefix() {
        let store = MemoryStore::new();
        store.insert("data/other.json", "{}");
        let orchestrator = Orchestrator::new(Arc::new(store.clone()), ExtractorConfig::default());

        orchestrator.ensure_prefix("data/").await.unwrap();
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_zero_limits_are_rejected_before_any_io() {
        let store = MemoryStore::new();
        store.insert("orders1.zip", "zip");

        for config in [
            ExtractorConfig {
                upload_concurrency: 0,
                ..ExtractorConfig::default()
            },
            ExtractorConfig {
                archive_concurrency: 0,
                ..ExtractorConfig::default()
            },
        ] {
            let orchestrator = Orchestrator::new(Arc::new(store.clone()), config);
            let err = tokio::time::timeout(std::time::Duration::from_secs(5), orchestrator.run())
                .await
                .expect("run should return promptly")
                .unwrap_err();
            assert!(matches!(err, ExtractError::Config(_)));
        }
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_empty_bucket_writes_nothing() {
        let store = MemoryStore::new();
        let orchestrator = Orchestrator::new(Arc::new(store.clone()), ExtractorConfig::default());

        let result = orchestrator.run().await.unwrap();
        assert_eq!(result.discovered, 0);
        assert_eq!(result.new_archives, 0);
        assert!(store.writes().is_empty());
    }
}
