//! The package archive produced by a build

use plugci_errors::{ArchiveError, Error};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entry name the bootstrap stub is stored under when persisted
pub const STUB_ENTRY: &str = ".stub";

/// Append-only package archive
///
/// Entries are write-once per path and kept in insertion order. The stub is
/// held apart from the entries and may be replaced until the archive is
/// persisted.
#[derive(Clone, Debug, Default)]
pub struct PackageArchive {
    entries: Vec<(String, Vec<u8>)>,
    index: HashMap<String, usize>,
    stub: Option<String>,
}

impl PackageArchive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an entry
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::DuplicateEntry` if `path` was already written
    /// (the first entry is kept), or `ArchiveError::InvalidPath` for empty,
    /// absolute or parent-relative paths.
    pub fn add(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<(), Error> {
        let path = path.into();
        if path.is_empty() || path.starts_with('/') || path.split('/').any(|part| part == "..") {
            return Err(ArchiveError::InvalidPath { path }.into());
        }
        if self.index.contains_key(&path) {
            return Err(ArchiveError::DuplicateEntry { path }.into());
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, bytes.into()));
        Ok(())
    }

    pub fn set_stub(&mut self, stub: impl Into<String>) {
        self.stub = Some(stub.into());
    }

    #[must_use]
    pub fn stub(&self) -> Option<&str> {
        self.stub.as_deref()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.index
            .get(path)
            .map(|&i| self.entries[i].1.as_slice())
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Entry paths in insertion order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the archive as a zip document
    ///
    /// The stub comes first as [`STUB_ENTRY`], then every entry in insertion
    /// order. Timestamps are fixed so identical archives serialize identically.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Zip` if the writer fails.
    pub fn to_zip_bytes(&self) -> Result<Vec<u8>, Error> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        if let Some(stub) = &self.stub {
            writer.start_file(STUB_ENTRY, options)?;
            writer.write_all(stub.as_bytes())?;
        }
        for (path, bytes) in &self.entries {
            writer.start_file(path.as_str(), options)?;
            writer.write_all(bytes)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    /// Persist the archive as a zip file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn write_zip(&self, path: &Path) -> Result<(), Error> {
        let bytes = self.to_zip_bytes()?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| Error::io_with_path(&e, path))
    }
}
