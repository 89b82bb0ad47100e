//! Error types for archive extraction and routing

use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Failures raised by an object-store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Store {operation} failed for '{key}': {source}")]
    Backend {
        operation: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    pub fn backend(
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        StoreError::Backend {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }
}

/// Main error type for the extraction pipeline
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Manifest is missing required column '{column}' (header: {header:?})")]
    ManifestFormat { column: String, header: Vec<String> },

    #[error("Malformed manifest row at line {line}: {source}")]
    ManifestParse {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("No '{extension}' manifest entry found in archive")]
    ManifestNotFound { extension: String },

    #[error("Archive holds {} '{extension}' manifest entries, expected exactly one: {candidates:?}", .candidates.len())]
    AmbiguousManifest {
        extension: String,
        candidates: Vec<String>,
    },

    #[error("Invalid archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),

    #[error("Failed to read archive entry '{entry}': {source}")]
    EntryRead {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Processed-state payload at '{key}' is corrupt: {reason}")]
    StateCorrupt { key: String, reason: String },

    #[error("Archive '{0}' is already recorded as processed")]
    DuplicateArchive(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Archive '{archive}' failed: {source}")]
    ArchiveFailed {
        archive: String,
        #[source]
        source: Box<ExtractError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExtractError {
    /// Attach the archive key to a per-archive failure
    pub fn in_archive(self, archive: impl Into<String>) -> Self {
        ExtractError::ArchiveFailed {
            archive: archive.into(),
            source: Box::new(self),
        }
    }
}
