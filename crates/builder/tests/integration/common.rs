//! Fakes shared by the builder integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use plugci_builder::*;
use plugci_errors::{Error, SandboxError};
use plugci_types::{BuildResult, ProjectManifest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const PLUGIN_YML: &str = "name: Example\nversion: 1.0.0\nmain: Vendor\\Example\\Main\napi: [4.0.0, 5.0.0]\n";

/// What the fake sandbox does for one major version
#[derive(Clone, Debug, Default)]
pub struct Script {
    pub exit_code: i32,
    pub stderr: String,
    /// Results document copied out on request; `None` makes the copy fail
    pub results: Option<String>,
    /// Copy out a directory where the results file should be
    pub results_as_directory: bool,
    pub fail_create: bool,
    pub fail_package_copy: bool,
    /// Local dependency path whose transfer fails
    pub fail_dependency: Option<PathBuf>,
    pub fail_destroy: bool,
    /// `run` never returns
    pub hang: bool,
}

impl Script {
    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn findings(results: &str) -> Self {
        Self {
            exit_code: 6,
            results: Some(results.to_string()),
            ..Self::default()
        }
    }

    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }
}

/// Sandbox runtime that follows a per-version script and records every call
#[derive(Default)]
pub struct ScriptedRuntime {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, api: &str, script: Script) -> Self {
        self.scripts.insert(api.to_string(), script);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn script(&self, id: &str) -> Script {
        let api = id.rsplit('-').next().unwrap_or_default();
        self.scripts.get(api).cloned().unwrap_or_default()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SandboxRuntime for ScriptedRuntime {
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxHandle, Error> {
        self.log(format!("create {} {}", spec.name, spec.image));
        if self.script(&spec.name).fail_create {
            return Err(SandboxError::CreateFailed {
                id: spec.name.clone(),
                message: "no space left on device".into(),
            }
            .into());
        }
        Ok(SandboxHandle::new(spec.name.clone()))
    }

    async fn copy_in(&self, handle: &SandboxHandle, local: &Path, remote: &str) -> Result<(), Error> {
        self.log(format!("copy_in {} {} {remote}", handle.id, local.display()));
        let script = self.script(&handle.id);
        let failing = (script.fail_package_copy && remote == "/source/plugin.zip")
            || script.fail_dependency.as_deref() == Some(local);
        if failing {
            return Err(SandboxError::CopyFailed {
                from: local.display().to_string(),
                to: remote.to_string(),
                message: "copy failed".into(),
            }
            .into());
        }
        Ok(())
    }

    async fn run(&self, handle: &SandboxHandle) -> Result<RunOutput, Error> {
        self.log(format!("run {}", handle.id));
        let script = self.script(&handle.id);
        if script.hang {
            std::future::pending::<()>().await;
        }
        Ok(RunOutput {
            exit_code: script.exit_code,
            stderr: script.stderr,
        })
    }

    async fn copy_out(&self, handle: &SandboxHandle, remote: &str, local: &Path) -> Result<(), Error> {
        self.log(format!("copy_out {} {remote}", handle.id));
        let script = self.script(&handle.id);
        if script.results_as_directory {
            return tokio::fs::create_dir(local).await.map_err(Error::from);
        }
        match script.results {
            Some(results) => tokio::fs::write(local, results).await.map_err(Error::from),
            None => Err(SandboxError::CopyFailed {
                from: remote.to_string(),
                to: local.display().to_string(),
                message: "no such file".into(),
            }
            .into()),
        }
    }

    async fn destroy(&self, handle: &SandboxHandle) -> Result<(), Error> {
        self.log(format!("destroy {}", handle.id));
        if self.script(&handle.id).fail_destroy {
            return Err(SandboxError::DestroyFailed {
                id: handle.id.clone(),
                message: "container is paused".into(),
            }
            .into());
        }
        Ok(())
    }
}

/// Linter that records every source file it is asked about
#[derive(Default)]
pub struct RecordingLinter {
    pub sources: Mutex<Vec<(String, bool, String, bool)>>,
}

#[async_trait]
impl Linter for RecordingLinter {
    async fn lint_manifest(
        &self,
        ctx: &BuildContext,
        result: &mut BuildResult,
        manifest: &[u8],
    ) -> Option<String> {
        ManifestLinter.lint_manifest(ctx, result, manifest).await
    }

    async fn lint_source(
        &self,
        _ctx: &BuildContext,
        _result: &mut BuildResult,
        request: SourceLintRequest<'_>,
    ) {
        self.sources.lock().unwrap().push((
            request.path.to_string(),
            request.is_entry_point,
            request.namespace_prefix.to_string(),
            request.config.is_some(),
        ));
    }
}

/// Injector that records the namespace prefix it was offered
#[derive(Default)]
pub struct RecordingInjector {
    pub prefixes: Mutex<Vec<String>>,
    pub apis: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl DependencyInjector for RecordingInjector {
    async fn inject_libraries(
        &self,
        _ctx: &BuildContext,
        archive: &mut PackageArchive,
        _tree: &dyn SourceTree,
        _manifest: &ProjectManifest,
        apis: &[String],
        namespace_prefix: NamespacePrefixFn<'_>,
    ) -> Result<(), Error> {
        self.prefixes.lock().unwrap().push(namespace_prefix());
        self.apis.lock().unwrap().extend(apis.iter().cloned());
        if self.fail {
            return Err(Error::internal("virion registry unreachable"));
        }
        archive.add("src/Vendor/Example/libs/Lib.php", b"<?php".to_vec())
    }
}

/// Minimal valid project at the repository root
pub fn project_tree() -> MemoryTree {
    MemoryTree::new()
        .with_file("plugin.yml", PLUGIN_YML)
        .with_file("src/Vendor/Example/Main.php", "<?php\nnamespace Vendor\\Example;\nclass Main {}\n")
        .with_file("resources/config.yml", "enabled: true\n")
        .with_file("README.md", "# Example\n")
}

pub fn settings(tmp: &Path) -> AnalysisSettings {
    AnalysisSettings {
        tmp_dir: tmp.to_path_buf(),
        ..AnalysisSettings::default()
    }
}

pub fn orchestrator(runtime: &Arc<ScriptedRuntime>, tmp: &Path) -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(runtime.clone(), settings(tmp))
}
