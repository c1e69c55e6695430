//! `SQLite`-backed release store and virion lookup

use std::path::PathBuf;

use async_trait::async_trait;
use plugci_errors::{Error, ResolveError, StoreError};
use semver::{Version, VersionReq};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{query, Row};

use crate::lookup::{ArtifactRef, ReleaseStore, VirionLookup, VirionQuery};

/// Release, build and virion records in a `SQLite` database
#[derive(Clone, Debug)]
pub struct SqliteReleaseStore {
    pool: SqlitePool,
    resource_dir: PathBuf,
}

impl SqliteReleaseStore {
    /// Wrap an existing pool
    #[must_use]
    pub fn new(pool: SqlitePool, resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            resource_dir: resource_dir.into(),
        }
    }

    /// Connect to a database URL
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectFailed` if the database cannot be opened.
    pub async fn connect(url: &str, resource_dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::ConnectFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::new(pool, resource_dir))
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the tables this store reads, if they do not exist
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub async fn create_schema(&self) -> Result<(), Error> {
        query(
            r"
            CREATE TABLE IF NOT EXISTS releases (
                release_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                build_id INTEGER NOT NULL,
                state INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        query(
            r"
            CREATE TABLE IF NOT EXISTS builds (
                build_id INTEGER PRIMARY KEY,
                resource_id INTEGER NOT NULL,
                class INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        query(
            r"
            CREATE TABLE IF NOT EXISTS virion_builds (
                build_id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                repo TEXT NOT NULL,
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                branch TEXT NOT NULL,
                api TEXT NOT NULL DEFAULT '',
                resource_id INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        query(
            r"
            CREATE TABLE IF NOT EXISTS repos (
                owner TEXT NOT NULL,
                repo TEXT NOT NULL,
                default_branch TEXT NOT NULL,
                PRIMARY KEY (owner, repo)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        query("CREATE INDEX IF NOT EXISTS idx_releases_name ON releases(name)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl SqliteReleaseStore {
    /// Default branch recorded for a repository, matched case-insensitively
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn default_branch(&self, owner: &str, repo: &str) -> Result<Option<String>, Error> {
        let row = query(
            "SELECT default_branch FROM repos \
             WHERE lower(owner) = lower(?1) AND lower(repo) = lower(?2)",
        )
        .bind(owner)
        .bind(repo)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<String, _>("default_branch")))
    }
}

#[async_trait]
impl ReleaseStore for SqliteReleaseStore {
    async fn latest_public_release(
        &self,
        name: &str,
        min_state: i64,
    ) -> Result<Option<i64>, Error> {
        let row = query(
            "SELECT build_id FROM releases WHERE name = ?1 AND state >= ?2 \
             ORDER BY build_id DESC LIMIT 1",
        )
        .bind(name)
        .bind(min_state)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<i64, _>("build_id")))
    }

    async fn build_resource(&self, build_id: i64, class: i64) -> Result<Option<i64>, Error> {
        let row = query("SELECT resource_id FROM builds WHERE build_id = ?1 AND class = ?2")
            .bind(build_id)
            .bind(class)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<i64, _>("resource_id")))
    }

    fn resource_path(&self, resource_id: i64, kind: &str) -> PathBuf {
        self.resource_dir.join(format!("{resource_id}.{kind}"))
    }
}

#[async_trait]
impl VirionLookup for SqliteReleaseStore {
    async fn find_virion(&self, q: &VirionQuery) -> Result<ArtifactRef, Error> {
        let requirement = if q.accepts_any_version() {
            None
        } else {
            Some(
                VersionReq::parse(q.constraint.trim()).map_err(|e| {
                    ResolveError::InvalidConstraint {
                        constraint: q.constraint.clone(),
                        message: e.to_string(),
                    }
                })?,
            )
        };

        let rows = query(
            "SELECT build_id, version, branch, api, resource_id FROM virion_builds \
             WHERE lower(owner) = lower(?1) AND lower(repo) = lower(?2) AND name = ?3 \
             ORDER BY build_id DESC",
        )
        .bind(q.owner.as_str())
        .bind(q.repo.as_str())
        .bind(q.name.as_str())
        .fetch_all(&self.pool)
        .await?;

        let not_found = || ResolveError::VirionNotFound {
            owner: q.owner.clone(),
            repo: q.repo.clone(),
            name: q.name.clone(),
        };
        if rows.is_empty() {
            return Err(not_found().into());
        }

        let wanted_branch = if q.uses_default_branch() {
            self.default_branch(&q.owner, &q.repo)
                .await?
                .ok_or_else(not_found)?
        } else {
            q.branch.clone()
        };

        for row in rows {
            let branch: String = row.get("branch");
            if branch != wanted_branch {
                continue;
            }

            let version: String = row.get("version");
            if let Some(requirement) = &requirement {
                match parse_lenient(&version) {
                    Some(parsed) if requirement.matches(&parsed) => {}
                    _ => continue,
                }
            }

            if let Some(accepted) = &q.accepted_apis {
                let api: String = row.get("api");
                let supported = api.split(',').map(str::trim).any(|declared| {
                    accepted
                        .iter()
                        .any(|major| plugci_types::major_version(declared) == major)
                });
                if !supported {
                    continue;
                }
            }

            return Ok(ArtifactRef {
                build_id: row.get("build_id"),
                resource_id: row.get("resource_id"),
                version,
            });
        }

        Err(ResolveError::NoMatchingVersion {
            name: q.name.clone(),
            constraint: q.constraint.clone(),
        }
        .into())
    }

    fn artifact_path(&self, artifact: &ArtifactRef) -> PathBuf {
        self.resource_path(artifact.resource_id, "phar")
    }
}

/// Parse a version, padding `1` and `1.2` out to three components
fn parse_lenient(version: &str) -> Option<Version> {
    let trimmed = version.trim().trim_start_matches('v');
    if let Ok(parsed) = Version::parse(trimmed) {
        return Some(parsed);
    }
    let components = trimmed.split('.').count();
    let padded = match components {
        1 => format!("{trimmed}.0.0"),
        2 => format!("{trimmed}.0"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}
