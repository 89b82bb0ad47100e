//! docroute extraction library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental extraction of purchase-order document archives held in an
//! object store. Each run:
//!
//! 1. lists the bucket for archives not yet recorded in the processed state,
//! 2. reads the `~`-delimited manifest inside each archive,
//! 3. copies every attachment to `<root>/<PO number>/<file>` for each order that
//!    lists it,
//! 4. records the archive so later runs skip it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use docroute_extract::{ExtractorConfig, Orchestrator, S3Store, StorageConfig};
//!
//! # async fn example() -> docroute_extract::Result<()> {
//! let store = S3Store::new(StorageConfig::from_env()?);
//! let orchestrator = Orchestrator::new(Arc::new(store), ExtractorConfig::from_env()?);
//! let result = orchestrator.run().await?;
//! println!("{} archives extracted", result.processed);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod manifest;
pub mod orchestrator;
pub mod router;
pub mod state;
pub mod storage;

pub use config::{ExtractorConfig, FlushPolicy, ManifestSchema};
pub use error::{ExtractError, Result, StoreError};
pub use orchestrator::{Orchestrator, RunResult};
pub use state::{ArchiveRecord, FileRecord, ProcessedState, StateTracker};
pub use storage::{MemoryStore, ObjectStore, ObjectSummary, S3Store, StorageConfig};
