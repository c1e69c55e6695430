//! Sandbox orchestration: exit codes, extraction and teardown

use crate::common::*;
use plugci_builder::*;
use plugci_events::{channel, AppEvent, GeneralEvent};
use plugci_resolver::ResolvedDependencies;
use plugci_types::{Diagnostic, LintCode, Severity};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::watch;

const RESULTS: &str = r#"{
    "totals": {"errors": 0, "file_errors": 3},
    "files": {
        "/source/src/Vendor/Example/Main.php": {
            "errors": 2,
            "messages": [
                {"message": "Call to an undefined method pocketmine\\Server::nope().", "line": 12, "ignorable": true},
                {"message": "Method Vendor\\Example\\Main::onEnable() should return void.", "line": 20}
            ]
        },
        "/source/src/Vendor/Example/Task.php": {
            "errors": 1,
            "messages": [{"message": "Unreachable statement.", "line": null}]
        }
    }
}"#;

fn apis(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

fn request<'a>(apis: &'a [String], deps: &'a ResolvedDependencies) -> AnalysisRequest<'a> {
    AnalysisRequest {
        package: Path::new("/tmp/repo.zip"),
        project_path: "",
        apis,
        dependencies: deps,
    }
}

fn internal_messages(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::InternalError { message, .. } => Some(message.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn clean_exit_records_nothing() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new().with_script("5", Script::exit(0)));
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "5")
        .await;

    assert!(diagnostics.is_empty());
    assert_eq!(runtime.count("run "), 1);
    assert_eq!(runtime.count("copy_out "), 0);
    assert_eq!(runtime.count("destroy "), 1);

    let created = &runtime.calls()[0];
    assert!(created.ends_with("pmmp/poggit-phpstan:0.5.2-pm5"));
}

#[tokio::test]
async fn findings_become_one_lint_per_message() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new().with_script("4", Script::findings(RESULTS)));
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "4")
        .await;

    let lints: Vec<_> = diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::Lint(finding) => Some(finding),
            _ => None,
        })
        .collect();
    assert_eq!(diagnostics.len(), 3);
    assert_eq!(lints.len(), 3);
    assert_eq!(lints[0].source_file.as_deref(), Some("src/Vendor/Example/Main.php"));
    assert_eq!(lints[0].line, Some(12));
    assert_eq!(
        lints[0].message,
        "Call to an undefined method pocketmine\\Server::nope()."
    );
    assert_eq!(lints[1].line, Some(20));
    assert_eq!(lints[2].source_file.as_deref(), Some("src/Vendor/Example/Task.php"));
    assert_eq!(lints[2].line, None);
    assert!(lints
        .iter()
        .all(|l| l.code == LintCode::StaticAnalysis && l.target_version.as_deref() == Some("4")));

    // scratch results are removed outside inspection mode
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    assert_eq!(runtime.count("destroy "), 1);
}

#[tokio::test]
async fn parse_error_crash_is_a_lint() {
    let tmp = tempdir().unwrap();
    let stderr = "Parse error: syntax error, unexpected '}' in /source/src/Vendor/Example/Main.php on line 7";
    let runtime = Arc::new(
        ScriptedRuntime::new().with_script("5", Script::exit(7).with_stderr(stderr)),
    );
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "5")
        .await;

    assert_eq!(diagnostics.len(), 1);
    let Diagnostic::Lint(finding) = &diagnostics[0] else {
        panic!("expected a lint, got {:?}", diagnostics[0]);
    };
    assert_eq!(
        finding.message,
        "Parse error: syntax error, unexpected '}' in src/Vendor/Example/Main.php on line 7"
    );
    assert_eq!(finding.target_version.as_deref(), Some("5"));
}

#[tokio::test]
async fn other_crash_is_internal_without_stderr() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .with_script("5", Script::exit(7).with_stderr("Segmentation fault in /source/vendor")),
    );
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "5")
        .await;

    assert_eq!(diagnostics.len(), 1);
    let Diagnostic::InternalError { incident_id, message } = &diagnostics[0] else {
        panic!("expected an internal error");
    };
    assert_eq!(incident_id, &ctx.job_id("5"));
    assert!(!message.contains("Segmentation"));
}

#[tokio::test]
async fn tool_failure_embeds_its_stderr() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .with_script("4", Script::exit(8).with_stderr("phpstan.neon: unknown parameter")),
    );
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "4")
        .await;

    let messages = internal_messages(&diagnostics);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("phpstan.neon: unknown parameter"));
}

#[tokio::test]
async fn teardown_runs_once_for_every_exit_code() {
    for code in [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 255] {
        let tmp = tempdir().unwrap();
        let script = if code == 6 {
            Script::findings(r#"{"totals": {}, "files": {}}"#)
        } else {
            Script::exit(code)
        };
        let runtime = Arc::new(ScriptedRuntime::new().with_script("5", script));
        let ctx = BuildContext::new("Example");
        let deps = ResolvedDependencies::default();

        let diagnostics = orchestrator(&runtime, tmp.path())
            .run_job(&ctx, request(&[], &deps), "5")
            .await;

        assert_eq!(runtime.count("destroy "), 1, "exit code {code}");
        let expected_internal = usize::from(!matches!(code, 0 | 6));
        assert_eq!(
            internal_messages(&diagnostics).len(),
            expected_internal,
            "exit code {code}"
        );
    }
}

#[tokio::test]
async fn inspection_mode_leaves_the_sandbox() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new().with_script("4", Script::findings(RESULTS)));
    let (tx, mut rx) = channel();
    let ctx = BuildContext::new("Example").with_debug(true).with_event_sender(tx);
    let deps = ResolvedDependencies::default();

    orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "4")
        .await;

    assert_eq!(runtime.count("destroy "), 0);
    let kept = tmp.path().join(format!("{}-results.json", ctx.job_id("4")));
    assert!(kept.exists());

    let mut logged = false;
    while let Ok(message) = rx.try_recv() {
        if let AppEvent::General(GeneralEvent::DebugLog { message, .. }) = message.event {
            logged |= message.ends_with(&kept.display().to_string());
        }
    }
    assert!(logged);
}

#[tokio::test]
async fn missing_results_file_is_an_internal_error() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new().with_script(
        "4",
        Script {
            exit_code: 6,
            results: None,
            ..Script::default()
        },
    ));
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "4")
        .await;

    let internal = internal_messages(&diagnostics);
    assert_eq!(internal.len(), 1);
    assert!(internal[0].contains("could not retrieve the results"));
    assert!(internal[0].contains(&ctx.job_id("4")));
    assert!(!diagnostics.iter().any(|d| matches!(d, Diagnostic::Lint(_))));
    assert_eq!(runtime.count("copy_out "), 1);
    assert_eq!(runtime.count("destroy "), 1);
}

#[tokio::test]
async fn unremovable_scratch_file_is_logged() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new().with_script(
        "5",
        Script {
            exit_code: 6,
            results_as_directory: true,
            ..Script::default()
        },
    ));
    let (tx, mut rx) = channel();
    let ctx = BuildContext::new("Example").with_event_sender(tx);
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "5")
        .await;

    let internal = internal_messages(&diagnostics);
    assert_eq!(internal.len(), 1);
    assert!(internal[0].contains("could not retrieve the results"));
    assert_eq!(runtime.count("destroy "), 1);

    let scratch = tmp.path().join(format!("{}-results.json", ctx.job_id("5")));
    let mut logged = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let AppEvent::General(GeneralEvent::DebugLog { message, .. }) = message.event {
            logged.push(message);
        }
    }
    assert_eq!(logged.len(), 1);
    assert!(logged[0].starts_with(&format!("could not remove {}", scratch.display())));
}

#[tokio::test]
async fn failed_provisioning_still_tears_down() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new().with_script(
        "5",
        Script {
            fail_create: true,
            ..Script::default()
        },
    ));
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "5")
        .await;

    assert_eq!(internal_messages(&diagnostics).len(), 1);
    assert_eq!(runtime.count("copy_in "), 0);
    assert_eq!(runtime.count("run "), 0);
    assert_eq!(runtime.count("destroy "), 1);
}

#[tokio::test]
async fn dependency_copy_failure_aborts_only_that_job() {
    let tmp = tempdir().unwrap();
    let broken = PathBuf::from("/res/7.phar");
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .with_script(
                "4",
                Script {
                    fail_dependency: Some(broken.clone()),
                    ..Script::default()
                },
            )
            .with_script("5", Script::exit(0)),
    );
    let ctx = BuildContext::new("Example");
    let mut deps = ResolvedDependencies::default();
    deps.resolved.insert("Alpha".into(), broken);
    deps.resolved.insert("Beta".into(), PathBuf::from("/res/8.phar"));
    let versions = apis(&["4", "5"]);

    let mut result = plugci_types::BuildResult::new();
    orchestrator(&runtime, tmp.path())
        .run_all(&ctx, request(&versions, &deps), &mut result)
        .await;

    assert_eq!(result.count(Severity::Internal), 1);
    let job4 = ctx.job_id("4");
    let job5 = ctx.job_id("5");
    let calls = runtime.calls();
    // the failing transfer stops the remaining ones
    assert!(!calls.contains(&format!("copy_in {job4} /res/8.phar /deps")));
    assert!(!calls.contains(&format!("run {job4}")));
    assert!(calls.contains(&format!("copy_in {job5} /res/8.phar /deps")));
    assert!(calls.contains(&format!("run {job5}")));
    assert_eq!(runtime.count("destroy "), 2);
}

#[tokio::test]
async fn corrupt_results_are_internal() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(
        ScriptedRuntime::new().with_script("5", Script::findings(r#"{"files": {}}"#)),
    );
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "5")
        .await;

    let messages = internal_messages(&diagnostics);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("corrupt"));
}

#[tokio::test(start_paused = true)]
async fn hanging_tool_times_out() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new().with_script(
        "5",
        Script {
            hang: true,
            ..Script::default()
        },
    ));
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();
    let orchestrator = AnalysisOrchestrator::new(
        runtime.clone(),
        AnalysisSettings {
            run_timeout: Duration::from_secs(30),
            ..settings(tmp.path())
        },
    );

    let diagnostics = orchestrator.run_job(&ctx, request(&[], &deps), "5").await;

    let messages = internal_messages(&diagnostics);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("timed out"));
    assert_eq!(runtime.count("destroy "), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_still_tears_down() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new().with_script(
        "4",
        Script {
            hang: true,
            ..Script::default()
        },
    ));
    let (cancel, signal) = watch::channel(false);
    let ctx = BuildContext::new("Example").with_cancellation(signal);
    let deps = ResolvedDependencies::default();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.send(true).unwrap();
        // keep the sender alive until the job has observed the signal
        tokio::time::sleep(Duration::from_secs(3600)).await;
    });

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "4")
        .await;

    let messages = internal_messages(&diagnostics);
    assert_eq!(diagnostics.len(), 1);
    assert!(messages[0].contains("cancelled"));
    assert_eq!(runtime.count("destroy "), 1);
}

#[tokio::test]
async fn teardown_failure_is_appended_after_the_outcome() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new().with_script(
        "4",
        Script {
            fail_destroy: true,
            ..Script::findings(RESULTS)
        },
    ));
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();

    let diagnostics = orchestrator(&runtime, tmp.path())
        .run_job(&ctx, request(&[], &deps), "4")
        .await;

    assert_eq!(diagnostics.len(), 4);
    assert!(diagnostics[..3].iter().all(|d| d.severity() == Severity::Lint));
    assert_eq!(diagnostics[3].severity(), Severity::Internal);
}

#[tokio::test]
async fn unsupported_versions_are_skipped_silently() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new());
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();
    let versions = apis(&["3", "5"]);

    let mut result = plugci_types::BuildResult::new();
    orchestrator(&runtime, tmp.path())
        .run_all(&ctx, request(&versions, &deps), &mut result)
        .await;

    assert!(result.diagnostics().is_empty());
    assert_eq!(runtime.count("create "), 1);
    assert!(runtime.calls()[0].contains(&ctx.job_id("5")));
}

#[tokio::test]
async fn concurrent_jobs_report_in_version_order() {
    let tmp = tempdir().unwrap();
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .with_script("4", Script::exit(3))
            .with_script("5", Script::findings(RESULTS)),
    );
    let ctx = BuildContext::new("Example");
    let deps = ResolvedDependencies::default();
    let versions = apis(&["4", "5"]);
    let orchestrator = AnalysisOrchestrator::new(
        runtime.clone(),
        AnalysisSettings {
            concurrent: true,
            ..settings(tmp.path())
        },
    );

    let mut result = plugci_types::BuildResult::new();
    orchestrator
        .run_all(&ctx, request(&versions, &deps), &mut result)
        .await;

    let severities: Vec<Severity> = result.diagnostics().iter().map(Diagnostic::severity).collect();
    assert_eq!(
        severities,
        vec![Severity::Internal, Severity::Lint, Severity::Lint, Severity::Lint]
    );
    assert_eq!(runtime.count("destroy "), 2);
}
