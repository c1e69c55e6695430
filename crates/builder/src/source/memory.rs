use super::{SourceEntry, SourceTree};
use plugci_errors::{Error, SourceError};
use std::path::{Path, PathBuf};

/// In-memory source tree, entries kept in insertion order
#[derive(Clone, Debug, Default)]
pub struct MemoryTree {
    files: Vec<(String, Vec<u8>)>,
    locator: PathBuf,
}

impl MemoryTree {
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            locator: PathBuf::from("memory"),
        }
    }

    /// Add a file, replacing any previous content at the same path
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    #[must_use]
    pub fn with_locator(mut self, locator: impl Into<PathBuf>) -> Self {
        self.locator = locator.into();
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        let path = path.into();
        let contents = contents.into();
        if let Some(slot) = self.files.iter_mut().find(|(p, _)| *p == path) {
            slot.1 = contents;
        } else {
            self.files.push((path, contents));
        }
    }
}

impl SourceTree for MemoryTree {
    fn exists(&self, path: &str) -> bool {
        !path.ends_with('/') && self.files.iter().any(|(p, _)| p == path)
    }

    fn entries(&self) -> Vec<SourceEntry> {
        self.files
            .iter()
            .map(|(path, _)| SourceEntry::new(path.clone()))
            .collect()
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, contents)| contents.clone())
            .ok_or_else(|| {
                SourceError::PathNotFound {
                    path: path.to_string(),
                }
                .into()
            })
    }

    fn locator(&self) -> &Path {
        &self.locator
    }
}
