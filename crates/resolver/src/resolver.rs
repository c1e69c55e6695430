//! Best-effort resolution of virion and plugin dependencies

use std::sync::Arc;

use plugci_errors::{Error, ResolveError, UserFacingError};
use plugci_events::{AppEvent, EventEmitter, ResolverEvent};
use plugci_types::{DependencyKind, LibraryDeclaration};

use crate::lookup::{ReleasePolicy, ReleaseStore, RepoRef, VirionLookup, VirionQuery};
use crate::{Resolution, ResolvedDependencies, SkipReason};

/// Artifact kind of built plugins and virions in the resource store
const ARTIFACT_KIND: &str = "phar";

/// Resolves declared dependencies to local artifact paths
#[derive(Clone, Default)]
pub struct DependencyResolver {
    virions: Option<Arc<dyn VirionLookup>>,
    releases: Option<Arc<dyn ReleaseStore>>,
    policy: ReleasePolicy,
}

impl std::fmt::Debug for DependencyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyResolver")
            .field("virions", &self.virions.is_some())
            .field("releases", &self.releases.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

impl DependencyResolver {
    /// Resolver with no collaborators; every dependency is skipped
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_virion_lookup(mut self, lookup: Arc<dyn VirionLookup>) -> Self {
        self.virions = Some(lookup);
        self
    }

    #[must_use]
    pub fn with_release_store(mut self, store: Arc<dyn ReleaseStore>) -> Self {
        self.releases = Some(store);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReleasePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve both kinds and merge them; plugins win on a name clash
    pub async fn resolve_all(
        &self,
        ctx: &impl EventEmitter,
        libs: &[LibraryDeclaration],
        project: &RepoRef,
        plugin_names: &[String],
    ) -> ResolvedDependencies {
        let mut deps = self.resolve_virions(ctx, libs, project).await;
        deps.merge(self.resolve_plugins(ctx, plugin_names).await);
        deps
    }

    /// Resolve declared virions
    ///
    /// Declarations without `src` are left to the injection collaborator and
    /// do not appear in the result at all.
    pub async fn resolve_virions(
        &self,
        ctx: &impl EventEmitter,
        libs: &[LibraryDeclaration],
        project: &RepoRef,
    ) -> ResolvedDependencies {
        let queries: Vec<VirionQuery> = libs
            .iter()
            .filter_map(|lib| {
                VirionQuery::from_src(
                    lib.src.as_deref()?,
                    lib.version.as_deref(),
                    lib.branch.as_deref(),
                    project,
                )
            })
            .collect();

        ctx.emit(AppEvent::Resolver(ResolverEvent::ResolutionStarted {
            kind: DependencyKind::Virion,
            declared: queries.len(),
        }));

        let mut deps = ResolvedDependencies::default();
        for query in &queries {
            let resolution = self.resolve_virion(query).await;
            emit_outcome(ctx, DependencyKind::Virion, &query.name, &resolution);
            deps.record(query.name.clone(), DependencyKind::Virion, resolution);
        }

        emit_completed(ctx, DependencyKind::Virion, &deps);
        deps
    }

    /// Resolve one virion query
    pub async fn resolve_virion(&self, query: &VirionQuery) -> Resolution {
        let Some(lookup) = &self.virions else {
            return Resolution::Skipped(SkipReason::Unavailable);
        };
        match lookup.find_virion(query).await {
            Ok(artifact) => Resolution::Resolved(lookup.artifact_path(&artifact)),
            Err(err) => Resolution::Skipped(skip_reason_for(&err)),
        }
    }

    /// Resolve plugin dependencies named in `plugin.yml`
    pub async fn resolve_plugins(
        &self,
        ctx: &impl EventEmitter,
        names: &[String],
    ) -> ResolvedDependencies {
        ctx.emit(AppEvent::Resolver(ResolverEvent::ResolutionStarted {
            kind: DependencyKind::Plugin,
            declared: names.len(),
        }));

        let mut deps = ResolvedDependencies::default();
        for name in names {
            let resolution = self.resolve_plugin(name).await;
            emit_outcome(ctx, DependencyKind::Plugin, name, &resolution);
            deps.record(name.clone(), DependencyKind::Plugin, resolution);
        }

        emit_completed(ctx, DependencyKind::Plugin, &deps);
        deps
    }

    /// Resolve one plugin by name: newest public release, then its
    /// development build artifact
    pub async fn resolve_plugin(&self, name: &str) -> Resolution {
        let Some(store) = &self.releases else {
            return Resolution::Skipped(SkipReason::Unavailable);
        };

        let build_id = match store
            .latest_public_release(name, self.policy.min_public_release_state)
            .await
        {
            Ok(Some(build_id)) => build_id,
            Ok(None) => return Resolution::Skipped(SkipReason::NoPublicRelease),
            Err(err) => return Resolution::Skipped(skip_reason_for(&err)),
        };

        match store
            .build_resource(build_id, self.policy.dev_build_class)
            .await
        {
            Ok(Some(resource_id)) => {
                Resolution::Resolved(store.resource_path(resource_id, ARTIFACT_KIND))
            }
            Ok(None) => Resolution::Skipped(SkipReason::NoDevelopmentBuild),
            Err(err) => Resolution::Skipped(skip_reason_for(&err)),
        }
    }
}

fn skip_reason_for(err: &Error) -> SkipReason {
    match err {
        Error::Resolve(
            ResolveError::VirionNotFound { .. } | ResolveError::NoMatchingVersion { .. },
        ) => SkipReason::NotFound(err.user_message().into_owned()),
        _ => SkipReason::LookupFailed(err.user_message().into_owned()),
    }
}

fn emit_outcome(ctx: &impl EventEmitter, kind: DependencyKind, name: &str, resolution: &Resolution) {
    let event = match resolution {
        Resolution::Resolved(path) => ResolverEvent::DependencyResolved {
            kind,
            name: name.to_string(),
            path: path.clone(),
        },
        Resolution::Skipped(reason) => ResolverEvent::DependencySkipped {
            kind,
            name: name.to_string(),
            reason: reason.to_string(),
        },
    };
    ctx.emit(AppEvent::Resolver(event));
}

fn emit_completed(ctx: &impl EventEmitter, kind: DependencyKind, deps: &ResolvedDependencies) {
    ctx.emit(AppEvent::Resolver(ResolverEvent::ResolutionCompleted {
        kind,
        resolved: deps.resolved.len(),
        skipped: deps.skipped.len(),
    }));
}
