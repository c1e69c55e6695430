//! Top-level build driver

use crate::analysis::{AnalysisOrchestrator, AnalysisRequest, AnalysisSettings, DockerRuntime, SandboxRuntime};
use crate::archive::PackageArchive;
use crate::assembler::{ArchiveAssembler, Assembly};
use crate::context::BuildContext;
use crate::inject::{DependencyInjector, NoopInjector};
use crate::lint::{Linter, ManifestLinter};
use crate::source::SourceTree;
use plugci_config::Config;
use plugci_errors::Error;
use plugci_events::{AppEvent, BuildEvent, BuildStage, EventEmitter, FailureContext};
use plugci_resolver::{DependencyResolver, ReleasePolicy};
use plugci_types::{BuildResult, LintConfig, PluginDescriptor, ProjectManifest, Severity};
use std::sync::Arc;
use std::time::Instant;

/// Everything a build produced
#[derive(Debug)]
pub struct BuildOutput {
    pub archive: PackageArchive,
    pub result: BuildResult,
    /// Parsed `plugin.yml`, when it was found and well-formed
    pub plugin: Option<PluginDescriptor>,
}

/// Builds package archives and runs static analysis on them
#[derive(Clone)]
pub struct Builder {
    config: Config,
    linter: Arc<dyn Linter>,
    injector: Arc<dyn DependencyInjector>,
    resolver: DependencyResolver,
    runtime: Arc<dyn SandboxRuntime>,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Create a builder with the built-in linter, no library injection, no
    /// dependency lookups and the Docker sandbox runtime
    #[must_use]
    pub fn new(config: Config) -> Self {
        let policy = ReleasePolicy {
            min_public_release_state: config.store.min_public_release_state,
            dev_build_class: config.store.dev_build_class,
        };
        let runtime = DockerRuntime::new(config.sandbox.docker_binary.clone());
        Self {
            config,
            linter: Arc::new(ManifestLinter::new()),
            injector: Arc::new(NoopInjector),
            resolver: DependencyResolver::new().with_policy(policy),
            runtime: Arc::new(runtime),
        }
    }

    #[must_use]
    pub fn with_linter(mut self, linter: Arc<dyn Linter>) -> Self {
        self.linter = linter;
        self
    }

    #[must_use]
    pub fn with_injector(mut self, injector: Arc<dyn DependencyInjector>) -> Self {
        self.injector = injector;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: DependencyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: Arc<dyn SandboxRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Assemble the package and, when the project is clean enough, analyze it
    ///
    /// # Errors
    ///
    /// Returns an error for operational failures during assembly, such as an
    /// unreadable source tree. Everything about the project itself, including
    /// analysis infrastructure faults, is reported in the build result.
    pub async fn build(
        &self,
        ctx: &BuildContext,
        tree: &dyn SourceTree,
        manifest: &ProjectManifest,
    ) -> Result<BuildOutput, Error> {
        let started = Instant::now();
        ctx.emit(AppEvent::Build(BuildEvent::Started {
            build_id: ctx.build_id.to_string(),
            project: ctx.project_name.clone(),
            project_path: manifest.path.clone(),
        }));

        let mut result = BuildResult::new();
        let assembler = ArchiveAssembler::new(self.linter.as_ref(), self.injector.as_ref());
        let assembly = match assembler.assemble(ctx, tree, manifest, &mut result).await {
            Ok(assembly) => assembly,
            Err(e) => {
                ctx.emit(AppEvent::Build(BuildEvent::Failed {
                    build_id: ctx.build_id.to_string(),
                    failure: FailureContext::from_error(&e),
                }));
                return Err(e);
            }
        };

        if !assembly.halted {
            self.analyze(ctx, tree, manifest, &assembly, &mut result).await;
        }

        ctx.emit(AppEvent::Build(BuildEvent::Completed {
            build_id: ctx.build_id.to_string(),
            worst: result.worst_severity(),
            diagnostics: result.diagnostics().len(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }));

        Ok(BuildOutput {
            archive: assembly.archive,
            result,
            plugin: assembly.plugin,
        })
    }

    /// Gate and run the analysis stage
    async fn analyze(
        &self,
        ctx: &BuildContext,
        tree: &dyn SourceTree,
        manifest: &ProjectManifest,
        assembly: &Assembly,
        result: &mut BuildResult,
    ) {
        let skip = |reason: &str| {
            ctx.emit(AppEvent::Build(BuildEvent::StageSkipped {
                stage: BuildStage::Analysis,
                reason: reason.to_string(),
            }));
        };

        if matches!(manifest.lint, LintConfig::Disabled) {
            return skip("linting is disabled for this project");
        }
        if !self.config.analysis.enabled {
            return skip("static analysis is disabled in the configuration");
        }
        if !manifest.static_analysis_enabled() {
            return skip("static analysis is disabled for this project");
        }
        if result.worst_severity() > Severity::Lint {
            return skip("the build already has problems");
        }

        ctx.emit(AppEvent::Build(BuildEvent::StageStarted {
            stage: BuildStage::Analysis,
        }));

        let plugin_names = assembly
            .plugin
            .as_ref()
            .map(PluginDescriptor::dependency_names)
            .unwrap_or_default();
        let dependencies = self
            .resolver
            .resolve_all(ctx, &manifest.libs, &ctx.repo, &plugin_names)
            .await;

        let orchestrator = AnalysisOrchestrator::new(
            Arc::clone(&self.runtime),
            AnalysisSettings::from_config(&self.config),
        );
        let request = AnalysisRequest {
            package: tree.locator(),
            project_path: &manifest.path,
            apis: &assembly.majors,
            dependencies: &dependencies,
        };
        orchestrator.run_all(ctx, request, result).await;
    }
}
