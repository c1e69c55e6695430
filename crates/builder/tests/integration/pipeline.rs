//! End-to-end builds through `Builder`

use crate::common::*;
use async_trait::async_trait;
use plugci_builder::*;
use plugci_config::Config;
use plugci_errors::{Error, ResolveError};
use plugci_events::{channel, AnalysisEvent, AppEvent, BuildEvent, BuildStage};
use plugci_resolver::{ArtifactRef, DependencyResolver, ReleaseStore, RepoRef, VirionLookup, VirionQuery};
use plugci_types::{ProjectManifest, Severity};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;

const FINDINGS: &str = r#"{"totals": {"file_errors": 1}, "files": {"/source/src/Vendor/Example/Main.php": {"messages": [{"line": 4, "message": "Undefined variable: $x"}]}}}"#;

/// Virion lookup that knows a single virion
struct OneVirion;

#[async_trait]
impl VirionLookup for OneVirion {
    async fn find_virion(&self, query: &VirionQuery) -> Result<ArtifactRef, Error> {
        if query.name == "libasynql" {
            return Ok(ArtifactRef {
                build_id: 10,
                resource_id: 77,
                version: "3.1.0".into(),
            });
        }
        Err(ResolveError::VirionNotFound {
            owner: query.owner.clone(),
            repo: query.repo.clone(),
            name: query.name.clone(),
        }
        .into())
    }

    fn artifact_path(&self, artifact: &ArtifactRef) -> PathBuf {
        PathBuf::from(format!("/res/{}.phar", artifact.resource_id))
    }
}

/// Release store where only `EconomyAPI` has a development build
struct OneRelease;

#[async_trait]
impl ReleaseStore for OneRelease {
    async fn latest_public_release(&self, name: &str, _min_state: i64) -> Result<Option<i64>, Error> {
        Ok((name == "EconomyAPI").then_some(500))
    }

    async fn build_resource(&self, build_id: i64, _class: i64) -> Result<Option<i64>, Error> {
        Ok((build_id == 500).then_some(900))
    }

    fn resource_path(&self, resource_id: i64, kind: &str) -> PathBuf {
        PathBuf::from(format!("/res/{resource_id}.{kind}"))
    }
}

fn config(tmp: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.paths.tmp_dir = Some(tmp.to_path_buf());
    config
}

#[tokio::test]
async fn clean_project_is_analyzed_for_each_version() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .with_script("4", Script::exit(0))
            .with_script("5", Script::findings(FINDINGS)),
    );
    let builder = Builder::new(config(tmp.path())).with_runtime(runtime.clone());
    let (tx, mut rx) = channel();
    let ctx = BuildContext::new("Example").with_event_sender(tx);
    let tree = project_tree().with_locator("/tmp/owner-repo.zip");

    let output = builder.build(&ctx, &tree, &ProjectManifest::default()).await.unwrap();

    assert_eq!(output.result.worst_severity(), Severity::Lint);
    assert_eq!(output.result.count(Severity::Lint), 1);
    assert_eq!(output.result.main(), "Vendor\\Example\\Main");
    assert_eq!(runtime.count("destroy "), 2);
    assert!(runtime
        .calls()
        .contains(&format!("copy_in {} /tmp/owner-repo.zip /source/plugin.zip", ctx.job_id("4"))));

    let mut completed = false;
    let mut analysis_started = false;
    while let Ok(message) = rx.try_recv() {
        match message.event {
            AppEvent::Build(BuildEvent::Completed { worst, diagnostics, .. }) => {
                assert_eq!(worst, Severity::Lint);
                assert_eq!(diagnostics, 1);
                completed = true;
            }
            AppEvent::Build(BuildEvent::StageStarted { stage: BuildStage::Analysis }) => {
                analysis_started = true;
            }
            _ => {}
        }
        assert_eq!(message.meta.correlation_id.as_deref(), Some(ctx.session_id.as_str()));
    }
    assert!(completed && analysis_started);
}

#[tokio::test]
async fn unresolved_dependencies_are_dropped_silently() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new());
    let resolver = DependencyResolver::new()
        .with_virion_lookup(Arc::new(OneVirion))
        .with_release_store(Arc::new(OneRelease));
    let builder = Builder::new(config(tmp.path()))
        .with_runtime(runtime.clone())
        .with_resolver(resolver);
    let ctx = BuildContext::new("Example").with_repo(RepoRef::new("owner", "repo"));
    let tree = MemoryTree::new()
        .with_file(
            "plugin.yml",
            "name: E\nversion: 1.0.0\nmain: E\\Main\napi: 5.0.0\ndepend: EconomyAPI\nsoftdepend: [Missing]\n",
        )
        .with_file("src/E/Main.php", "<?php");
    let manifest = ProjectManifest::from_yaml(
        "libs:\n  - src: poggit/libasynql/libasynql\n    version: ^3.0.0\n  - src: nobody/nothing\n  - format: virion\n",
    )
    .unwrap();

    let output = builder.build(&ctx, &tree, &manifest).await.unwrap();

    assert!(output.result.diagnostics().is_empty());
    let job = ctx.job_id("5");
    let deps: Vec<String> = runtime
        .calls()
        .into_iter()
        .filter(|c| c.starts_with(&format!("copy_in {job}")) && c.ends_with("/deps"))
        .collect();
    assert_eq!(
        deps,
        vec![
            format!("copy_in {job} /res/900.phar /deps"),
            format!("copy_in {job} /res/77.phar /deps"),
        ]
    );
}

#[tokio::test]
async fn disabled_lint_skips_analysis() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new());
    let builder = Builder::new(config(tmp.path())).with_runtime(runtime.clone());
    let ctx = BuildContext::new("Example");

    for yaml in ["lint: false\n", "lint:\n  phpstan: false\n"] {
        let manifest = ProjectManifest::from_yaml(yaml).unwrap();
        let output = builder.build(&ctx, &project_tree(), &manifest).await.unwrap();
        assert!(output.result.diagnostics().is_empty());
    }
    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn analysis_disabled_by_configuration() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new());
    let mut config = config(tmp.path());
    config.analysis.enabled = false;
    let builder = Builder::new(config).with_runtime(runtime.clone());

    builder
        .build(&BuildContext::new("Example"), &project_tree(), &ProjectManifest::default())
        .await
        .unwrap();

    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn problems_before_analysis_suppress_it() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new());
    let injector = Arc::new(RecordingInjector {
        fail: true,
        ..RecordingInjector::default()
    });
    let builder = Builder::new(config(tmp.path()))
        .with_runtime(runtime.clone())
        .with_injector(injector);
    let (tx, mut rx) = channel();
    let ctx = BuildContext::new("Example").with_event_sender(tx);

    let output = builder
        .build(&ctx, &project_tree(), &ProjectManifest::default())
        .await
        .unwrap();

    assert_eq!(output.result.worst_severity(), Severity::Internal);
    assert!(runtime.calls().is_empty());
    let mut skipped = false;
    while let Ok(message) = rx.try_recv() {
        if let AppEvent::Build(BuildEvent::StageSkipped { stage: BuildStage::Analysis, .. }) = message.event {
            skipped = true;
        }
    }
    assert!(skipped);
}

#[tokio::test]
async fn lints_do_not_block_analysis() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new());
    let builder = Builder::new(config(tmp.path())).with_runtime(runtime.clone());
    let tree = project_tree().with_file("src/Vendor/Example/Broken.php", "no open tag");

    let output = builder
        .build(&BuildContext::new("Example"), &tree, &ProjectManifest::default())
        .await
        .unwrap();

    assert_eq!(output.result.worst_severity(), Severity::Lint);
    assert_eq!(runtime.count("run "), 2);
}

#[tokio::test]
async fn missing_manifest_never_reaches_the_sandbox() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new());
    let builder = Builder::new(config(tmp.path())).with_runtime(runtime.clone());
    let tree = MemoryTree::new().with_file("src/A.php", "<?php");

    let output = builder
        .build(&BuildContext::new("Example"), &tree, &ProjectManifest::default())
        .await
        .unwrap();

    assert!(output.result.has_build_error());
    assert_eq!(output.result.diagnostics().len(), 1);
    assert!(output.plugin.is_none());
    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn unsupported_versions_emit_an_event() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new());
    let builder = Builder::new(config(tmp.path())).with_runtime(runtime.clone());
    let (tx, mut rx) = channel();
    let ctx = BuildContext::new("Example").with_event_sender(tx);
    let tree = MemoryTree::new()
        .with_file("plugin.yml", "name: E\nversion: 1.0.0\nmain: E\\Main\napi: [3.0.0]\n");

    let output = builder.build(&ctx, &tree, &ProjectManifest::default()).await.unwrap();

    assert!(output.result.diagnostics().is_empty());
    assert!(runtime.calls().is_empty());
    let mut unsupported = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let AppEvent::Analysis(AnalysisEvent::UnsupportedVersion { api }) = message.event {
            unsupported.push(api);
        }
    }
    assert_eq!(unsupported, vec!["3"]);
}

#[tokio::test]
async fn builder_uses_the_configured_collaborators() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new());
    let linter = Arc::new(RecordingLinter::default());
    let injector = Arc::new(RecordingInjector::default());
    let builder = Builder::new(config(tmp.path()))
        .with_runtime(runtime.clone())
        .with_linter(linter.clone())
        .with_injector(injector.clone());
    let ctx = BuildContext::new("Example");

    let output = builder
        .build(&ctx, &project_tree(), &ProjectManifest::default())
        .await
        .unwrap();

    assert_eq!(
        *linter.sources.lock().unwrap(),
        vec![(
            "src/Vendor/Example/Main.php".to_string(),
            true,
            String::new(),
            true
        )]
    );
    assert_eq!(*injector.prefixes.lock().unwrap(), vec!["Vendor\\Example\\".to_string()]);
    assert!(output.archive.contains("src/Vendor/Example/libs/Lib.php"));
    assert_eq!(output.result.worst_severity(), Severity::Ok);
    assert_eq!(runtime.count("destroy"), 2);
}
