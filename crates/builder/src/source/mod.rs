//! Read-only views over a checked-out source tree

mod memory;
mod zipball;

pub use memory::MemoryTree;
pub use zipball::{RootHandling, ZipballTree};

use plugci_errors::Error;
use std::path::Path;

/// One entry of a source tree; content is read on demand
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceEntry {
    /// Path relative to the tree root, `/`-separated
    pub path: String,
    /// Directory markers end with `/` and carry no content
    pub is_dir: bool,
}

impl SourceEntry {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let is_dir = path.ends_with('/');
        Self { path, is_dir }
    }
}

/// Read-only source tree the builder assembles from
pub trait SourceTree: Send + Sync {
    /// Whether a file exists at `path`
    fn exists(&self, path: &str) -> bool;

    /// Every entry in tree order, directories included
    fn entries(&self) -> Vec<SourceEntry>;

    /// Entries under `root`; only direct children unless `recursive`
    fn entries_under(&self, root: &str, recursive: bool) -> Vec<SourceEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| {
                let Some(rest) = entry.path.strip_prefix(root) else {
                    return false;
                };
                !rest.is_empty()
                    && (recursive || !rest.trim_end_matches('/').contains('/'))
            })
            .collect()
    }

    /// Read the content of a file
    ///
    /// # Errors
    ///
    /// Returns a `SourceError` if the path does not exist or cannot be read.
    fn read(&self, path: &str) -> Result<Vec<u8>, Error>;

    /// Opaque local locator of the whole tree, transferred into sandboxes
    fn locator(&self) -> &Path;
}
