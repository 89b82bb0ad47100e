//! Archive unpacker
//!
//! Opens a zip held in memory and exposes its entries by name. Only the central
//! directory is read up front; entry content is decompressed when an entry is
//! opened, so attachments can be streamed out one at a time.

use bytes::Bytes;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

use crate::error::{ExtractError, Result};

/// One file inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the zip central directory
    pub index: usize,
    /// Final path segment, as used for routing and file records
    pub name: String,
    /// Full path inside the archive
    pub path: String,
    /// Uncompressed size in bytes
    pub size: u64,
}

impl ArchiveEntry {
    pub fn has_extension(&self, extension: &str) -> bool {
        self.name.ends_with(extension)
    }
}

pub struct ArchiveReader {
    zip: ZipArchive<Cursor<Bytes>>,
    entries: Vec<ArchiveEntry>,
}

impl ArchiveReader {
    /// Read the central directory; directory entries are skipped
    pub fn open(data: Bytes) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(data))?;
        let mut entries = Vec::with_capacity(zip.len());

        for index in 0..zip.len() {
            let file = zip.by_index(index)?;
            if file.is_dir() {
                continue;
            }

            let path = file.name().to_string();
            let name = path
                .rsplit(|c| c == '/' || c == '\\')
                .next()
                .unwrap_or(path.as_str())
                .to_string();

            if name.is_empty() {
                continue;
            }

            entries.push(ArchiveEntry {
                index,
                name,
                path,
                size: file.size(),
            });
        }

        debug!(entries = entries.len(), "Opened archive");

        Ok(Self { zip, entries })
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn entries_with_extension<'a>(
        &'a self,
        extension: &'a str,
    ) -> impl Iterator<Item = &'a ArchiveEntry> + 'a {
        self.entries.iter().filter(move |e| e.has_extension(extension))
    }

    /// The single manifest entry
    ///
    /// Zero candidates is `ManifestNotFound`, more than one is `AmbiguousManifest`.
    pub fn manifest(&self, extension: &str) -> Result<ArchiveEntry> {
        let mut candidates = self.entries_with_extension(extension);

        match (candidates.next(), candidates.next()) {
            (Some(entry), None) => Ok(entry.clone()),
            (None, _) => Err(ExtractError::ManifestNotFound {
                extension: extension.to_string(),
            }),
            (Some(_), Some(_)) => Err(ExtractError::AmbiguousManifest {
                extension: extension.to_string(),
                candidates: self
                    .entries_with_extension(extension)
                    .map(|e| e.path.clone())
                    .collect(),
            }),
        }
    }

    /// Open an entry's decompressing content stream
    pub fn open_entry(&mut self, entry: &ArchiveEntry) -> Result<impl Read + '_> {
        Ok(self.zip.by_index(entry.index)?)
    }

    /// Decompress an entry fully
    pub fn read_entry(&mut self, entry: &ArchiveEntry) -> Result<Bytes> {
        let mut content = Vec::with_capacity(usize::try_from(entry.size).unwrap_or(0));
        self.open_entry(entry)?
            .read_to_end(&mut content)
            .map_err(|source| ExtractError::EntryRead {
                entry: entry.path.clone(),
                source,
            })?;
        Ok(Bytes::from(content))
    }
}
