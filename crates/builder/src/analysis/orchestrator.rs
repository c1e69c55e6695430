//! Per-version analysis jobs with guaranteed teardown

use super::exit::{crash_lint_message, ExitOutcome};
use super::job::AnalysisJob;
use super::results::parse_results;
use super::runtime::{RunOutput, SandboxHandle, SandboxRuntime, SandboxSpec};
use crate::context::BuildContext;
use crate::utils::timeout::with_timeout;
use plugci_config::Config;
use plugci_errors::{Error, SandboxError};
use plugci_events::{AnalysisEvent, AppEvent, EventEmitter, FailureContext};
use plugci_resolver::ResolvedDependencies;
use plugci_types::{BuildResult, Diagnostic, JobState, LintCode, LintFinding};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Sandbox parameters shared by every job of a build
#[derive(Clone, Debug)]
pub struct AnalysisSettings {
    pub supported_apis: Vec<String>,
    /// Image template; `{api}` is replaced by the major version
    pub image: String,
    pub cpus: String,
    pub memory: String,
    pub run_timeout: Duration,
    pub concurrent: bool,
    pub package_path: String,
    pub dependencies_dir: String,
    pub results_path: String,
    pub source_prefix: String,
    pub tmp_dir: PathBuf,
}

impl AnalysisSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            supported_apis: config.analysis.supported_apis.clone(),
            image: config.analysis.image.clone(),
            cpus: config.analysis.cpus.clone(),
            memory: config.analysis.memory.clone(),
            run_timeout: Duration::from_secs(config.analysis.run_timeout_secs),
            concurrent: config.analysis.concurrent_jobs,
            package_path: config.sandbox.package_path.clone(),
            dependencies_dir: config.sandbox.dependencies_dir.clone(),
            results_path: config.sandbox.results_path.clone(),
            source_prefix: config.sandbox.source_prefix.clone(),
            tmp_dir: config.tmp_dir(),
        }
    }

    /// Whether a major API version has an analysis image
    #[must_use]
    pub fn supports(&self, major: &str) -> bool {
        self.supported_apis.iter().any(|api| api == major)
    }

    /// Analysis image for a major API version
    #[must_use]
    pub fn image_for(&self, major: &str) -> String {
        self.image.replace("{api}", major)
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Inputs of one analysis stage
#[derive(Clone, Copy, Debug)]
pub struct AnalysisRequest<'a> {
    /// Local file transferred into every sandbox
    pub package: &'a Path,
    /// Project subdirectory, empty or ending with `/`
    pub project_path: &'a str,
    /// Deduplicated major versions in declaration order
    pub apis: &'a [String],
    pub dependencies: &'a ResolvedDependencies,
}

/// A job step that failed before the tool's exit code could be interpreted
struct StepFailure {
    phrase: &'static str,
    error: Error,
}

fn step(phrase: &'static str) -> impl FnOnce(Error) -> StepFailure {
    move |error| StepFailure { phrase, error }
}

/// Runs analysis jobs against a sandbox runtime
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    runtime: Arc<dyn SandboxRuntime>,
    settings: AnalysisSettings,
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AnalysisOrchestrator {
    #[must_use]
    pub fn new(runtime: Arc<dyn SandboxRuntime>, settings: AnalysisSettings) -> Self {
        Self { runtime, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Run one job per supported major version and append their diagnostics
    ///
    /// Unsupported versions are reported as events and skipped. Each job's
    /// diagnostics are appended as a block, in version order, whether jobs
    /// ran one after another or concurrently.
    pub async fn run_all(
        &self,
        ctx: &BuildContext,
        request: AnalysisRequest<'_>,
        result: &mut BuildResult,
    ) {
        let mut apis = Vec::new();
        for api in request.apis {
            if self.settings.supports(api) {
                apis.push(api.as_str());
            } else {
                ctx.emit(AppEvent::Analysis(AnalysisEvent::UnsupportedVersion {
                    api: api.clone(),
                }));
            }
        }

        if self.settings.concurrent {
            let jobs = apis.iter().map(|api| self.run_job(ctx, request, api));
            for diagnostics in futures::future::join_all(jobs).await {
                result.extend(diagnostics);
            }
        } else {
            for api in apis {
                let diagnostics = self.run_job(ctx, request, api).await;
                result.extend(diagnostics);
            }
        }
    }

    /// Run a single job and return its diagnostics
    ///
    /// Teardown runs on every path unless the build is in inspection mode,
    /// including when provisioning failed or the build was cancelled.
    pub async fn run_job(
        &self,
        ctx: &BuildContext,
        request: AnalysisRequest<'_>,
        api: &str,
    ) -> Vec<Diagnostic> {
        let mut job = AnalysisJob::new(ctx.job_id(api), api);
        let mut report = BuildResult::new();

        if ctx.is_cancelled() {
            ctx.record(&mut report, Diagnostic::internal(&job.id, cancelled_message(api)));
            return report.diagnostics().to_vec();
        }

        ctx.emit(AppEvent::Analysis(AnalysisEvent::JobCreated {
            job_id: job.id.clone(),
            api: api.to_string(),
        }));
        let handle = SandboxHandle::new(job.id.clone());

        let outcome = tokio::select! {
            outcome = self.drive(ctx, &mut job, &handle, request, &mut report) => outcome,
            () = ctx.cancelled() => Err(StepFailure { phrase: "cancelled", error: Error::Cancelled }),
        };

        if let Err(failure) = outcome {
            // an aborted job contributes nothing but its failure
            if matches!(failure.error, Error::Cancelled) {
                report = BuildResult::new();
            }
            ctx.emit(AppEvent::Analysis(AnalysisEvent::JobFailed {
                job_id: job.id.clone(),
                api: api.to_string(),
                failure: FailureContext::from_error(&failure.error),
            }));
            ctx.record(
                &mut report,
                Diagnostic::internal(&job.id, failure_message(api, &job.id, &failure)),
            );
        }

        self.teardown(ctx, &mut job, &handle, &mut report).await;
        report.diagnostics().to_vec()
    }

    async fn drive(
        &self,
        ctx: &BuildContext,
        job: &mut AnalysisJob,
        handle: &SandboxHandle,
        request: AnalysisRequest<'_>,
        report: &mut BuildResult,
    ) -> Result<(), StepFailure> {
        let spec = self.sandbox_spec(&job.id, &job.api, request.project_path);
        self.runtime
            .create(&spec)
            .await
            .map_err(step("could not provision the sandbox"))?;
        job.advance(ctx, JobState::ContainerProvisioned);

        self.runtime
            .copy_in(handle, request.package, &self.settings.package_path)
            .await
            .map_err(step("could not transfer the plugin"))?;
        job.advance(ctx, JobState::SourceTransferred);

        for path in request.dependencies.resolved.values() {
            self.runtime
                .copy_in(handle, path, &self.settings.dependencies_dir)
                .await
                .map_err(step("could not transfer a dependency"))?;
        }
        job.advance(ctx, JobState::DependenciesTransferred);

        let output = with_timeout(self.runtime.run(handle), self.settings.run_timeout, &job.id)
            .await
            .map_err(step("could not run analysis"))?;
        job.advance(ctx, JobState::Executed);
        ctx.emit(AppEvent::Analysis(AnalysisEvent::ToolExited {
            job_id: job.id.clone(),
            exit_code: output.exit_code,
            stderr_bytes: output.stderr.len(),
        }));

        let outcome = ExitOutcome::from_code(output.exit_code);
        match outcome {
            ExitOutcome::Clean => {
                job.advance(ctx, JobState::Skipped);
                emit_completed(ctx, job, 0);
            }
            ExitOutcome::Findings => {
                let findings = self.extract_results(ctx, job, handle).await?;
                let count = findings.len();
                for finding in findings {
                    ctx.record(report, finding);
                }
                job.advance(ctx, JobState::ResultsExtracted);
                emit_completed(ctx, job, count);
            }
            ExitOutcome::Crashed => {
                match crash_lint_message(&output.stderr, &self.settings.source_prefix) {
                    Some(message) => ctx.record(
                        report,
                        LintFinding::new(LintCode::StaticAnalysis, message).with_target(&job.api),
                    ),
                    None => self.exit_failure(ctx, job, &output, report),
                }
            }
            ExitOutcome::ToolFailure => {
                self.exit_failure(ctx, job, &output, report);
            }
            ExitOutcome::PackageExtractionFailed
            | ExitOutcome::DependencyExtractionFailed
            | ExitOutcome::DependencyInstallFailed
            | ExitOutcome::Unhandled(_) => {
                self.exit_failure(ctx, job, &output, report);
            }
        }
        Ok(())
    }

    async fn extract_results(
        &self,
        ctx: &BuildContext,
        job: &AnalysisJob,
        handle: &SandboxHandle,
    ) -> Result<Vec<LintFinding>, StepFailure> {
        let local = self.settings.tmp_dir.join(format!("{}-results.json", job.id));
        self.runtime
            .copy_out(handle, &self.settings.results_path, &local)
            .await
            .map_err(step("could not retrieve the results"))?;

        let bytes = tokio::fs::read(&local)
            .await
            .map_err(|e| Error::io_with_path(&e, &local))
            .map_err(step("could not retrieve the results"));
        if ctx.debug {
            ctx.emit_debug(format!("results of {} kept at {}", job.id, local.display()));
        } else if let Err(e) = tokio::fs::remove_file(&local).await {
            ctx.emit_debug(format!("could not remove {}: {e}", local.display()));
        }

        parse_results(&bytes?, &job.api, &self.settings.source_prefix)
            .map_err(step("the results are corrupt"))
    }

    async fn teardown(
        &self,
        ctx: &BuildContext,
        job: &mut AnalysisJob,
        handle: &SandboxHandle,
        report: &mut BuildResult,
    ) {
        if ctx.debug {
            ctx.emit(AppEvent::Analysis(AnalysisEvent::TeardownSkipped {
                job_id: job.id.clone(),
            }));
            return;
        }

        match self.runtime.destroy(handle).await {
            Ok(()) => {
                job.advance(ctx, JobState::TornDown);
            }
            Err(e) => {
                ctx.emit(AppEvent::Analysis(AnalysisEvent::TeardownFailed {
                    job_id: job.id.clone(),
                    failure: FailureContext::from_error(&e),
                }));
                ctx.record(
                    report,
                    Diagnostic::internal(
                        &job.id,
                        format!(
                            "Static analysis for API {} could not clean up its sandbox; \
                             contact support with ID '{}' if this persists.",
                            job.api, job.id
                        ),
                    ),
                );
            }
        }
    }

    /// Record an internal error for a documented failure exit code
    fn exit_failure(
        &self,
        ctx: &BuildContext,
        job: &AnalysisJob,
        output: &RunOutput,
        report: &mut BuildResult,
    ) {
        let outcome = ExitOutcome::from_code(output.exit_code);
        let phrase = outcome.failure_phrase().unwrap_or("failed");
        let stderr = output.stderr.as_str();
        ctx.emit(AppEvent::Analysis(AnalysisEvent::JobFailed {
            job_id: job.id.clone(),
            api: job.api.clone(),
            failure: FailureContext::new(
                Some("analysis.exit_status"),
                format!("exit status {}: {}", output.exit_code, stderr.trim_end()),
                None::<String>,
                false,
            ),
        }));

        let message = if outcome == ExitOutcome::ToolFailure {
            let stderr = self.strip_source_prefix(stderr);
            format!(
                "Static analysis for API {} {phrase} (ID '{}'): {}",
                job.api,
                job.id,
                stderr.trim()
            )
        } else {
            format!(
                "Static analysis for API {} failed with ID '{}': {phrase}. \
                 Contact support with the ID if this persists.",
                job.api, job.id
            )
        };
        ctx.record(report, Diagnostic::internal(&job.id, message));
    }

    fn strip_source_prefix(&self, text: &str) -> String {
        super::exit::strip_prefix_all(text, &self.settings.source_prefix)
    }

    fn sandbox_spec(&self, id: &str, api: &str, project_path: &str) -> SandboxSpec {
        SandboxSpec {
            name: id.to_string(),
            image: self.settings.image_for(api),
            cpus: self.settings.cpus.clone(),
            memory: self.settings.memory.clone(),
            env: BTreeMap::from([("PLUGIN_PATH".to_string(), plugin_path(project_path))]),
        }
    }
}

fn emit_completed(ctx: &BuildContext, job: &AnalysisJob, findings: usize) {
    ctx.emit(AppEvent::Analysis(AnalysisEvent::JobCompleted {
        job_id: job.id.clone(),
        api: job.api.clone(),
        findings,
    }));
}

/// `/` for the repository root, `/<path>/` otherwise
fn plugin_path(project_path: &str) -> String {
    let trimmed = project_path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

fn cancelled_message(api: &str) -> String {
    format!("Static analysis for API {api} was cancelled.")
}

fn failure_message(api: &str, id: &str, failure: &StepFailure) -> String {
    match &failure.error {
        Error::Cancelled => cancelled_message(api),
        Error::Sandbox(SandboxError::Timeout { seconds, .. }) => format!(
            "Static analysis for API {api} timed out after {seconds}s (ID '{id}'). \
             Contact support with the ID if this persists."
        ),
        _ => format!(
            "Static analysis for API {api} failed with ID '{id}': {}. \
             Contact support with the ID if this persists.",
            failure.phrase
        ),
    }
}
