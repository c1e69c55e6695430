#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency resolution for plugci
//!
//! Resolves the two dependency kinds a build needs in its analysis sandbox:
//! virions declared in the project manifest and plugins named in
//! `plugin.yml`. Resolution is best-effort; a dependency that cannot be
//! resolved is recorded as skipped with a reason and never fails the build.

mod lookup;
mod resolver;
mod sqlite;

pub use lookup::{ArtifactRef, ReleasePolicy, ReleaseStore, RepoRef, VirionLookup, VirionQuery};
pub use resolver::DependencyResolver;
pub use sqlite::SqliteReleaseStore;

use plugci_types::DependencyKind;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Outcome of resolving a single dependency
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Mapped to a local artifact
    Resolved(PathBuf),
    /// Intentionally dropped
    Skipped(SkipReason),
}

/// Why a dependency was dropped
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No lookup collaborator or store is configured for this kind
    Unavailable,
    /// The lookup found no matching virion build
    NotFound(String),
    /// The lookup itself failed
    LookupFailed(String),
    /// No release at or above the public visibility threshold
    NoPublicRelease,
    /// The latest public release has no development build artifact
    NoDevelopmentBuild,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => f.write_str("no resolver configured"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::LookupFailed(message) => write!(f, "lookup failed: {message}"),
            Self::NoPublicRelease => f.write_str("no public release"),
            Self::NoDevelopmentBuild => f.write_str("no development build for latest release"),
        }
    }
}

/// A dependency that did not make it into the resolved map
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedDependency {
    pub name: String,
    pub kind: DependencyKind,
    pub reason: SkipReason,
}

/// Name to local artifact path, plus the dependencies that were dropped
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedDependencies {
    pub resolved: BTreeMap<String, PathBuf>,
    pub skipped: Vec<SkippedDependency>,
}

impl ResolvedDependencies {
    /// Record the outcome for one dependency
    pub fn record(&mut self, name: impl Into<String>, kind: DependencyKind, resolution: Resolution) {
        let name = name.into();
        match resolution {
            Resolution::Resolved(path) => {
                self.resolved.insert(name, path);
            }
            Resolution::Skipped(reason) => {
                self.skipped.push(SkippedDependency { name, kind, reason });
            }
        }
    }

    /// Merge another set in; its entries win on a name clash
    pub fn merge(&mut self, other: ResolvedDependencies) {
        self.resolved.extend(other.resolved);
        self.skipped.extend(other.skipped);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Skip reason recorded for a name, if it was skipped
    #[must_use]
    pub fn skip_reason(&self, name: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|skipped| skipped.name == name)
            .map(|skipped| &skipped.reason)
    }
}
