//! Collaborator seams for dependency lookups

use async_trait::async_trait;
use plugci_errors::Error;
use std::path::PathBuf;

/// Version constraint meaning "any version"
pub const ANY_VERSION: &str = "*";

/// Branch selector meaning "the repository's default branch"
pub const DEFAULT_BRANCH: &str = ":default";

/// Repository that owns the project being built
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    #[must_use]
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parse `owner/repo`
    #[must_use]
    pub fn parse(slug: &str) -> Option<Self> {
        let (owner, repo) = slug.trim().split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self::new(owner, repo))
    }
}

/// A fully-qualified virion lookup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirionQuery {
    pub owner: String,
    pub repo: String,
    pub name: String,
    /// Semver requirement, or `*`
    pub constraint: String,
    /// Branch name, or `:default`
    pub branch: String,
    /// Major API versions the virion must support; `None` accepts any
    pub accepted_apis: Option<Vec<String>>,
}

impl VirionQuery {
    /// Build a query from a declared `src` of the form `owner/repo/name`,
    /// `repo/name` or `name`, filling the missing leading parts from the
    /// current project's repository.
    ///
    /// Returns `None` when `src` has no path segments.
    #[must_use]
    pub fn from_src(
        src: &str,
        version: Option<&str>,
        branch: Option<&str>,
        project: &RepoRef,
    ) -> Option<Self> {
        let trimmed = src.trim().trim_matches('/');
        let mut parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty()).collect();
        let name = parts.pop()?;
        let repo = parts.pop().unwrap_or(project.repo.as_str());
        let owner = parts.pop().unwrap_or(project.owner.as_str());
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            name: name.to_string(),
            constraint: version.unwrap_or(ANY_VERSION).to_string(),
            branch: branch.unwrap_or(DEFAULT_BRANCH).to_string(),
            accepted_apis: None,
        })
    }

    #[must_use]
    pub fn accepts_any_version(&self) -> bool {
        self.constraint.trim() == ANY_VERSION
    }

    #[must_use]
    pub fn uses_default_branch(&self) -> bool {
        self.branch == DEFAULT_BRANCH
    }
}

/// A virion build found by a lookup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactRef {
    pub build_id: i64,
    pub resource_id: i64,
    pub version: String,
}

/// Finds virion builds
#[async_trait]
pub trait VirionLookup: Send + Sync {
    /// Find the newest virion build matching the query
    ///
    /// # Errors
    ///
    /// Returns a `ResolveError` when nothing matches or the lookup fails.
    async fn find_virion(&self, query: &VirionQuery) -> Result<ArtifactRef, Error>;

    /// Local path of the virion artifact
    fn artifact_path(&self, artifact: &ArtifactRef) -> PathBuf;
}

/// Release and build records
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Build id of the newest release of `name` whose state is at least
    /// `min_state`
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store cannot be queried.
    async fn latest_public_release(&self, name: &str, min_state: i64)
        -> Result<Option<i64>, Error>;

    /// Resource id of the build artifact if the build has the given class
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store cannot be queried.
    async fn build_resource(&self, build_id: i64, class: i64) -> Result<Option<i64>, Error>;

    /// Local path of a stored resource
    fn resource_path(&self, resource_id: i64, kind: &str) -> PathBuf;
}

/// Thresholds applied to plugin dependency lookups
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleasePolicy {
    pub min_public_release_state: i64,
    pub dev_build_class: i64,
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self {
            min_public_release_state: 4,
            dev_build_class: 1,
        }
    }
}
