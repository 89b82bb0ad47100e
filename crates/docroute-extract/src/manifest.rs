//! Relationship manifest parser
//!
//! Every archive carries one delimited text manifest relating purchase-order
//! numbers to the attachments that belong to them:
//!
//! ```text
//! PO Number~Vendor~Attachment List
//! PO100~Acme~docs/x.pdf,docs/y.pdf
//! ~Acme~loose/z.pdf
//! ```
//!
//! Only the two configured columns are read. Attachment paths are reduced to
//! their final segment, and rows with a blank identifier land in the
//! unidentified bucket.

use std::collections::BTreeMap;
use std::io::Read;
use tracing::debug;

use crate::config::ManifestSchema;
use crate::error::{ExtractError, Result};

/// Identifier to attachment filenames, built fresh for each archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentRouting {
    by_identifier: BTreeMap<String, Vec<String>>,
}

impl AttachmentRouting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append attachments to an identifier, creating it if needed
    pub fn add<I>(&mut self, identifier: impl Into<String>, attachments: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.by_identifier
            .entry(identifier.into())
            .or_default()
            .extend(attachments);
    }

    pub fn attachments(&self, identifier: &str) -> Option<&[String]> {
        self.by_identifier.get(identifier).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.by_identifier
            .iter()
            .map(|(id, files)| (id.as_str(), files.as_slice()))
    }

    /// Identifiers whose list references `filename`, each reported once
    pub fn identifiers_for<'a>(&'a self, filename: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.by_identifier
            .iter()
            .filter(move |(_, files)| files.iter().any(|f| f == filename))
            .map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identifier.is_empty()
    }
}

/// Parse a manifest stream into an [`AttachmentRouting`]
///
/// Fails with `ManifestFormat` when either configured column is missing from the
/// header, and with `ManifestParse` when a row cannot be read or its field count
/// differs from the header's.
pub fn parse_manifest<R: Read>(reader: R, schema: &ManifestSchema) -> Result<AttachmentRouting> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(schema.delimiter)
        .has_headers(true)
        .flexible(false)
        .quoting(false)
        .from_reader(reader);

    let header: Vec<String> = csv_reader
        .headers()
        .map_err(|source| ExtractError::ManifestParse { line: 1, source })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let identifier_idx = column_index(&header, &schema.identifier_column)?;
    let attachments_idx = column_index(&header, &schema.attachments_column)?;

    let mut routing = AttachmentRouting::new();
    let mut rows = 0usize;

    for (row, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|source| {
            let line = source
                .position()
                .map(|p| p.line())
                .unwrap_or(row as u64 + 2);
            ExtractError::ManifestParse { line, source }
        })?;

        let identifier = match record.get(identifier_idx).map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => schema.unidentified_bucket.clone(),
        };

        let attachments = record
            .get(attachments_idx)
            .map(attachment_names)
            .unwrap_or_default();

        routing.add(identifier, attachments);
        rows += 1;
    }

    debug!(rows, identifiers = routing.len(), "Parsed manifest");

    Ok(routing)
}

fn column_index(header: &[String], column: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| ExtractError::ManifestFormat {
            column: column.to_string(),
            header: header.to_vec(),
        })
}

/// Final path segment of every comma-separated entry
fn attachment_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|path| path.trim().rsplit('/').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
