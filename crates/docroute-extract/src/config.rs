//! Extraction configuration
//!
//! Prefixes, file extensions, manifest layout and concurrency limits for a run.
//! Values come from `DOCROUTE_*` environment variables (a `.env` file is loaded
//! first when present) and fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Root prefix under which routed attachments are written.
pub const DEFAULT_DESTINATION_ROOT: &str = "by-po";

/// Object key holding the processed-state payload.
pub const DEFAULT_STATE_KEY: &str = "data/extractor-state.json";

/// Extension identifying archives to process.
pub const DEFAULT_ARCHIVE_EXTENSION: &str = ".zip";

/// Extension identifying the manifest entry inside an archive.
pub const DEFAULT_MANIFEST_EXTENSION: &str = ".csv";

/// Extension identifying routable attachment entries.
pub const DEFAULT_ATTACHMENT_EXTENSION: &str = ".pdf";

/// Manifest column delimiter.
pub const DEFAULT_MANIFEST_DELIMITER: u8 = b'~';

/// Header of the business-identifier column.
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "PO Number";

/// Header of the comma-separated attachment list column.
pub const DEFAULT_ATTACHMENTS_COLUMN: &str = "Attachment List";

/// Bucket used for rows without an identifier.
pub const DEFAULT_UNIDENTIFIED_BUCKET: &str = "Unfiled";

/// Archives processed concurrently.
pub const DEFAULT_ARCHIVE_CONCURRENCY: usize = 4;

/// Uploads in flight per archive.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 8;

/// When the processed state is written back to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    /// Flush after every completed archive; a failure loses nothing that finished
    #[default]
    PerArchive,
    /// Flush once after all archives succeed; any failure discards the run's progress
    EndOfRun,
}

impl std::str::FromStr for FlushPolicy {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "per-archive" | "per_archive" | "incremental" => Ok(FlushPolicy::PerArchive),
            "end-of-run" | "end_of_run" | "once" => Ok(FlushPolicy::EndOfRun),
            other => Err(ExtractError::Config(format!("unknown flush policy '{}'", other))),
        }
    }
}

impl std::fmt::Display for FlushPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushPolicy::PerArchive => write!(f, "per-archive"),
            FlushPolicy::EndOfRun => write!(f, "end-of-run"),
        }
    }
}

/// Layout of the relationship manifest found in every archive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestSchema {
    pub delimiter: u8,
    pub identifier_column: String,
    pub attachments_column: String,
    pub unidentified_bucket: String,
}

impl Default for ManifestSchema {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_MANIFEST_DELIMITER,
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            attachments_column: DEFAULT_ATTACHMENTS_COLUMN.to_string(),
            unidentified_bucket: DEFAULT_UNIDENTIFIED_BUCKET.to_string(),
        }
    }
}

/// Configuration handed to the orchestrator at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Prefix for routed attachments, without trailing slash
    pub destination_root: String,
    /// Key of the processed-state payload
    pub state_key: String,
    pub archive_extension: String,
    pub manifest_extension: String,
    pub attachment_extension: String,
    pub manifest: ManifestSchema,
    /// Maximum archives processed at once
    pub archive_concurrency: usize,
    /// Maximum uploads in flight within one archive
    pub upload_concurrency: usize,
    pub flush_policy: FlushPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            destination_root: DEFAULT_DESTINATION_ROOT.to_string(),
            state_key: DEFAULT_STATE_KEY.to_string(),
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            manifest_extension: DEFAULT_MANIFEST_EXTENSION.to_string(),
            attachment_extension: DEFAULT_ATTACHMENT_EXTENSION.to_string(),
            manifest: ManifestSchema::default(),
            archive_concurrency: DEFAULT_ARCHIVE_CONCURRENCY,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            flush_policy: FlushPolicy::default(),
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from environment variables
    ///
    /// - `DOCROUTE_DESTINATION_ROOT`
    /// - `DOCROUTE_STATE_KEY`
    /// - `DOCROUTE_ARCHIVE_EXTENSION`, `DOCROUTE_MANIFEST_EXTENSION`, `DOCROUTE_ATTACHMENT_EXTENSION`
    /// - `DOCROUTE_MANIFEST_DELIMITER` (single ASCII character)
    /// - `DOCROUTE_IDENTIFIER_COLUMN`, `DOCROUTE_ATTACHMENTS_COLUMN`, `DOCROUTE_UNIDENTIFIED_BUCKET`
    /// - `DOCROUTE_ARCHIVE_CONCURRENCY`, `DOCROUTE_UPLOAD_CONCURRENCY`
    /// - `DOCROUTE_FLUSH_POLICY` (`per-archive` or `end-of-run`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok();

        let delimiter = match var("DOCROUTE_MANIFEST_DELIMITER") {
            Some(raw) => parse_delimiter(&raw)?,
            None => defaults.manifest.delimiter,
        };

        let config = Self {
            destination_root: var("DOCROUTE_DESTINATION_ROOT")
                .map(|root| root.trim_end_matches('/').to_string())
                .unwrap_or(defaults.destination_root),
            state_key: var("DOCROUTE_STATE_KEY").unwrap_or(defaults.state_key),
            archive_extension: var("DOCROUTE_ARCHIVE_EXTENSION")
                .unwrap_or(defaults.archive_extension),
            manifest_extension: var("DOCROUTE_MANIFEST_EXTENSION")
                .unwrap_or(defaults.manifest_extension),
            attachment_extension: var("DOCROUTE_ATTACHMENT_EXTENSION")
                .unwrap_or(defaults.attachment_extension),
            manifest: ManifestSchema {
                delimiter,
                identifier_column: var("DOCROUTE_IDENTIFIER_COLUMN")
                    .unwrap_or(defaults.manifest.identifier_column),
                attachments_column: var("DOCROUTE_ATTACHMENTS_COLUMN")
                    .unwrap_or(defaults.manifest.attachments_column),
                unidentified_bucket: var("DOCROUTE_UNIDENTIFIED_BUCKET")
                    .unwrap_or(defaults.manifest.unidentified_bucket),
            },
            archive_concurrency: match var("DOCROUTE_ARCHIVE_CONCURRENCY") {
                Some(raw) => parse_limit("DOCROUTE_ARCHIVE_CONCURRENCY", &raw)?,
                None => defaults.archive_concurrency,
            },
            upload_concurrency: match var("DOCROUTE_UPLOAD_CONCURRENCY") {
                Some(raw) => parse_limit("DOCROUTE_UPLOAD_CONCURRENCY", &raw)?,
                None => defaults.upload_concurrency,
            },
            flush_policy: match var("DOCROUTE_FLUSH_POLICY") {
                Some(raw) => raw.parse()?,
                None => defaults.flush_policy,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.destination_root.trim_matches('/').is_empty() {
            return Err(ExtractError::Config(
                "destination root cannot be empty".to_string(),
            ));
        }

        if self.destination_root.ends_with('/') {
            return Err(ExtractError::Config(format!(
                "destination root '{}' must not end with '/'",
                self.destination_root
            )));
        }

        if self.state_key.is_empty() || self.state_key.ends_with('/') {
            return Err(ExtractError::Config(format!(
                "state key '{}' must name an object",
                self.state_key
            )));
        }

        for (name, ext) in [
            ("archive", &self.archive_extension),
            ("manifest", &self.manifest_extension),
            ("attachment", &self.attachment_extension),
        ] {
            if ext.is_empty() {
                return Err(ExtractError::Config(format!("{} extension cannot be empty", name)));
            }
        }

        if self.state_key.ends_with(&self.archive_extension) {
            return Err(ExtractError::Config(format!(
                "state key '{}' would be discovered as an archive",
                self.state_key
            )));
        }

        if self.manifest.identifier_column.trim().is_empty()
            || self.manifest.attachments_column.trim().is_empty()
        {
            return Err(ExtractError::Config("manifest column names cannot be empty".to_string()));
        }

        if self.manifest.identifier_column == self.manifest.attachments_column {
            return Err(ExtractError::Config(
                "identifier and attachment columns must differ".to_string(),
            ));
        }

        if self.manifest.unidentified_bucket.trim().is_empty() {
            return Err(ExtractError::Config("unidentified bucket cannot be empty".to_string()));
        }

        if self.archive_concurrency == 0 || self.upload_concurrency == 0 {
            return Err(ExtractError::Config("concurrency limits must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// True for keys the pipeline should treat as candidate archives
    pub fn is_archive_key(&self, key: &str) -> bool {
        key.ends_with(&self.archive_extension) && !self.is_destination_key(key)
    }

    /// True for keys under the destination root
    pub fn is_destination_key(&self, key: &str) -> bool {
        key.strip_prefix(&self.destination_root)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Prefix marker for the destination root (`by-po/`)
    pub fn destination_prefix(&self) -> String {
        format!("{}/", self.destination_root)
    }

    /// Directory prefix holding the state payload, if the key is nested
    pub fn state_prefix(&self) -> Option<String> {
        self.state_key
            .rfind('/')
            .map(|idx| self.state_key[..=idx].to_string())
    }
}

fn parse_limit(name: &str, raw: &str) -> Result<usize> {
    raw.trim().parse().map_err(|_| {
        ExtractError::Config(format!("{} must be a positive integer, got '{}'", name, raw))
    })
}

fn parse_delimiter(raw: &str) -> Result<u8> {
    match raw.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(ExtractError::Config(format!(
            "manifest delimiter must be a single ASCII character, got '{}'",
            raw
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.destination_prefix(), "by-po/");
        assert_eq!(config.state_prefix().as_deref(), Some("data/"));
    }

    #[test]
    fn test_archive_key_filter() {
        let config = ExtractorConfig::default();
        assert!(config.is_archive_key("orders1.zip"));
        assert!(config.is_archive_key("incoming/2024/orders2.zip"));
        assert!(!config.is_archive_key("orders1.zip.part"));
        assert!(!config.is_archive_key("by-po/PO1/bundle.zip"));
        assert!(config.is_archive_key("by-pox/bundle.zip"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = ExtractorConfig {
            archive_concurrency: 0,
            ..ExtractorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ExtractError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_same_columns() {
        let mut config = ExtractorConfig::default();
        config.manifest.attachments_column = config.manifest.identifier_column.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_flush_policy_parse() {
        assert_eq!("per-archive".parse::<FlushPolicy>().unwrap(), FlushPolicy::PerArchive);
        assert_eq!("END-OF-RUN".parse::<FlushPolicy>().unwrap(), FlushPolicy::EndOfRun);
        assert!("sometimes".parse::<FlushPolicy>().is_err());
        assert_eq!(FlushPolicy::EndOfRun.to_string(), "end-of-run");
    }

    #[test]
    fn test_validate_rejects_trailing_slash_on_root() {
        let config = ExtractorConfig {
            destination_root: "by-po/".to_string(),
            ..ExtractorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ExtractError::Config(_))));
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit("DOCROUTE_UPLOAD_CONCURRENCY", " 16 ").unwrap(), 16);
        assert!(matches!(
            parse_limit("DOCROUTE_ARCHIVE_CONCURRENCY", "four"),
            Err(ExtractError::Config(msg)) if msg.contains("DOCROUTE_ARCHIVE_CONCURRENCY")
        ));
        assert!(parse_limit("DOCROUTE_UPLOAD_CONCURRENCY", "-1").is_err());
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter("|").unwrap(), b'|');
        assert!(parse_delimiter("~~").is_err());
        assert!(parse_delimiter("").is_err());
    }
}
