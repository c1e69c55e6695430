use super::{SourceEntry, SourceTree};
use plugci_errors::{Error, SourceError};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zip::ZipArchive;

/// What to do with a top-level directory shared by every zipball entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RootHandling {
    /// Strip it only when it is named like a hosted `owner-repo-sha/` wrapper
    #[default]
    Detect,
    /// Always strip it
    Strip,
    /// Keep every path as stored
    Keep,
}

/// Source tree backed by a repository zipball
///
/// Hosted zipballs wrap the repository in a single `owner-repo-sha/`
/// directory; that prefix is stripped so paths are repository-relative.
/// Content is decompressed only when read.
pub struct ZipballTree {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
    entries: Vec<SourceEntry>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ZipballTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipballTree")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl ZipballTree {
    /// Open a zipball and index its entries, detecting a hosted wrapper
    ///
    /// # Errors
    ///
    /// Returns `SourceError::OpenFailed` if the file is missing or not a zip.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        Self::open_with(path, RootHandling::Detect)
    }

    /// Open a zipball with explicit handling of its top-level directory
    ///
    /// # Errors
    ///
    /// Returns `SourceError::OpenFailed` if the file is missing or not a zip.
    pub fn open_with(path: impl Into<PathBuf>, root: RootHandling) -> Result<Self, Error> {
        let path = path.into();
        let open_failed = |message: String| SourceError::OpenFailed {
            path: path.display().to_string(),
            message,
        };

        let file = File::open(&path).map_err(|e| open_failed(e.to_string()))?;
        let archive = ZipArchive::new(file).map_err(|e| open_failed(e.to_string()))?;

        let names: Vec<String> = (0..archive.len())
            .filter_map(|i| archive.name_for_index(i).map(str::to_string))
            .collect();
        let prefix = match root {
            RootHandling::Keep => String::new(),
            RootHandling::Strip => common_root(&names),
            RootHandling::Detect => {
                let shared = common_root(&names);
                if is_hosted_wrapper(&shared) {
                    shared
                } else {
                    String::new()
                }
            }
        };

        let mut entries = Vec::with_capacity(names.len());
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let relative = &name[prefix.len()..];
            if relative.is_empty() {
                continue;
            }
            entries.push(SourceEntry::new(relative));
            index.insert(relative.to_string(), i);
        }

        Ok(Self {
            path,
            archive: Mutex::new(archive),
            entries,
            index,
        })
    }
}

/// The single top-level directory shared by every entry, if there is one
fn common_root(names: &[String]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let Some((root, _)) = first.split_once('/') else {
        return String::new();
    };
    let prefix = format!("{root}/");
    if names.iter().all(|name| name.starts_with(&prefix)) {
        prefix
    } else {
        String::new()
    }
}

/// Whether `root` reads as `owner-repo-<commit>/`
fn is_hosted_wrapper(root: &str) -> bool {
    let Some((name, commit)) = root.trim_end_matches('/').rsplit_once('-') else {
        return false;
    };
    !name.is_empty() && commit.len() >= 7 && commit.chars().all(|c| c.is_ascii_hexdigit())
}

impl SourceTree for ZipballTree {
    fn exists(&self, path: &str) -> bool {
        !path.ends_with('/') && self.index.contains_key(path)
    }

    fn entries(&self) -> Vec<SourceEntry> {
        self.entries.clone()
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
        let read_failed = |message: String| SourceError::ReadFailed {
            path: path.to_string(),
            message,
        };

        let &i = self.index.get(path).ok_or_else(|| SourceError::PathNotFound {
            path: path.to_string(),
        })?;
        let mut archive = self
            .archive
            .lock()
            .map_err(|_| read_failed("archive lock poisoned".to_string()))?;
        let mut file = archive.by_index(i).map_err(|e| read_failed(e.to_string()))?;
        let mut contents = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut contents)
            .map_err(|e| read_failed(e.to_string()))?;
        Ok(contents)
    }

    fn locator(&self) -> &Path {
        &self.path
    }
}
