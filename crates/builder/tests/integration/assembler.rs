//! Archive assembly: rules, stub, manifest checks and tree walk

use crate::common::*;
use plugci_builder::*;
use plugci_types::{
    BuildResult, Diagnostic, LintCode, ProjectManifest, Severity, WarningCode, INVALID_MAIN,
};
use std::io::{Read, Write};

async fn assemble(tree: &MemoryTree, manifest: &ProjectManifest) -> (Assembly, BuildResult) {
    assemble_with(tree, manifest, &ManifestLinter, &NoopInjector).await
}

async fn assemble_with(
    tree: &MemoryTree,
    manifest: &ProjectManifest,
    linter: &dyn Linter,
    injector: &dyn DependencyInjector,
) -> (Assembly, BuildResult) {
    let ctx = BuildContext::new("Example");
    let mut result = BuildResult::new();
    let assembly = ArchiveAssembler::new(linter, injector)
        .assemble(&ctx, tree, manifest, &mut result)
        .await
        .unwrap();
    (assembly, result)
}

fn manifest(yaml: &str) -> ProjectManifest {
    ProjectManifest::from_yaml(yaml).unwrap()
}

#[tokio::test]
async fn default_rules_package_src_and_resources() {
    let (assembly, result) = assemble(&project_tree(), &ProjectManifest::default()).await;

    let paths: Vec<&str> = assembly.archive.paths().collect();
    assert_eq!(
        paths,
        vec![
            SENTINEL_ENTRY,
            "plugin.yml",
            "src/Vendor/Example/Main.php",
            "resources/config.yml"
        ]
    );
    assert_eq!(assembly.archive.stub(), Some(NOOP_STUB));
    assert_eq!(assembly.majors, vec!["4", "5"]);
    assert!(!assembly.halted);
    assert!(result.diagnostics().is_empty());
    assert_eq!(result.main(), "Vendor\\Example\\Main");
}

#[tokio::test]
async fn exact_file_mapping_beats_exclusions() {
    let tree = project_tree()
        .with_file("src/Vendor/Example/gen/Keep.php", "<?php")
        .with_file("src/Vendor/Example/gen/Drop.php", "<?php")
        .with_file("resources/secret.txt", "hunter2");
    let manifest = manifest(
        "includeFiles:\n  src/Vendor/Example/gen/Keep.php: src/Vendor/Example/gen/Keep.php\n  \
         resources/secret.txt: resources/secret.txt\n\
         excludeDirs: [src/Vendor/Example/gen]\n\
         excludeFiles: [resources/secret.txt]\n",
    );

    let (assembly, _) = assemble(&tree, &manifest).await;

    assert!(assembly.archive.contains("src/Vendor/Example/gen/Keep.php"));
    assert!(assembly.archive.contains("resources/secret.txt"));
    assert!(!assembly.archive.contains("src/Vendor/Example/gen/Drop.php"));
}

#[tokio::test]
async fn first_declared_directory_rule_wins() {
    let tree = project_tree()
        .with_file("lib/util/Str.php", "<?php")
        .with_file("lib/Other.php", "<?php");
    let manifest = manifest("includeDirs:\n  lib: third_party\n  lib/util: util\n");

    let (assembly, _) = assemble(&tree, &manifest).await;

    assert!(assembly.archive.contains("third_party/util/Str.php"));
    assert!(assembly.archive.contains("third_party/Other.php"));
    assert!(!assembly.archive.contains("util/Str.php"));
}

#[tokio::test]
async fn missing_plugin_manifest_halts_with_one_build_error() {
    let tree = MemoryTree::new()
        .with_file("src/Vendor/Example/Main.php", "<?php")
        .with_file("resources/a.txt", "a");

    let (assembly, result) = assemble(&tree, &ProjectManifest::default()).await;

    assert!(assembly.halted);
    assert_eq!(result.diagnostics().len(), 1);
    assert_eq!(result.worst_severity(), Severity::BuildError);
    let Diagnostic::BuildError { context, .. } = &result.diagnostics()[0] else {
        panic!("expected a build error");
    };
    assert!(context.contains("plugin.yml"));
    let paths: Vec<&str> = assembly.archive.paths().collect();
    assert_eq!(paths, vec![SENTINEL_ENTRY]);
    assert_eq!(assembly.archive.stub(), Some(NOOP_STUB));
}

#[tokio::test]
async fn manifest_is_looked_up_under_the_project_path() {
    let tree = MemoryTree::new()
        .with_file("plugin.yml", PLUGIN_YML)
        .with_file("plugins/Example/plugin.yml", PLUGIN_YML)
        .with_file("plugins/Example/src/Main.php", "<?php")
        .with_file("src/Root.php", "<?php");
    let manifest = manifest("path: plugins/Example\n");

    let (assembly, result) = assemble(&tree, &manifest).await;

    assert!(!result.has_build_error());
    assert!(assembly.archive.contains("src/Main.php"));
    assert!(!assembly.archive.contains("src/Root.php"));
}

#[tokio::test]
async fn corrupted_manifest_halts_before_the_walk() {
    let tree = MemoryTree::new()
        .with_file("plugin.yml", "name: [Example\n")
        .with_file("src/A.php", "<?php");

    let (assembly, result) = assemble(&tree, &ProjectManifest::default()).await;

    assert!(assembly.halted);
    assert!(result.has_build_error());
    assert_eq!(result.main(), INVALID_MAIN);
    assert!(assembly.archive.contains("plugin.yml"));
    assert!(!assembly.archive.contains("src/A.php"));
}

#[tokio::test]
async fn stub_resolution() {
    let tree = project_tree()
        .with_file("boot.php", "<?php echo 'root';")
        .with_file("plugins/X/boot.php", "<?php echo 'nested';")
        .with_file("plugins/X/plugin.yml", PLUGIN_YML);

    let (absolute, result) = assemble(&tree, &manifest("stub: /boot.php\n")).await;
    assert!(result.diagnostics().is_empty());
    assert_eq!(
        absolute.archive.get(ABSOLUTE_STUB_ENTRY),
        Some(&b"<?php echo 'root';"[..])
    );
    assert!(absolute.archive.stub().unwrap().contains("'stub.php'"));

    let (relative, _) = assemble(&tree, &manifest("path: plugins/X\nstub: boot.php\n")).await;
    assert_eq!(
        relative.archive.get("plugins/X/boot.php"),
        Some(&b"<?php echo 'nested';"[..])
    );
    assert!(relative.archive.stub().unwrap().contains("'plugins/X/boot.php'"));

    let (missing, result) = assemble(&tree, &manifest("stub: nope.php\n")).await;
    assert_eq!(missing.archive.stub(), Some(NOOP_STUB));
    assert_eq!(result.diagnostics().len(), 1);
    let Diagnostic::Lint(finding) = &result.diagnostics()[0] else {
        panic!("expected a lint");
    };
    assert_eq!(finding.code, LintCode::PromisedStubMissing);
    assert!(finding.message.contains("nope.php"));
}

#[tokio::test]
async fn repeated_major_version_warns_once() {
    let tree = MemoryTree::new().with_file(
        "plugin.yml",
        "name: E\nversion: 1.0.0\nmain: E\\Main\napi: [4.0.0, 4.1.0, 5.0.0, 4.2.0, 5.3.0]\n",
    );

    let (assembly, result) = assemble(&tree, &ProjectManifest::default()).await;

    assert_eq!(assembly.majors, vec!["4", "5"]);
    let warnings: Vec<_> = result
        .diagnostics()
        .iter()
        .filter(|d| matches!(d, Diagnostic::Warning { code: WarningCode::RedundantApi, .. }))
        .collect();
    assert_eq!(warnings.len(), 1);
}

#[tokio::test]
async fn duplicate_destinations_keep_the_first_entry() {
    let tree = MemoryTree::new()
        .with_file("plugin.yml", PLUGIN_YML)
        .with_file("alt/config.yml", "first")
        .with_file("resources/config.yml", "second");
    let manifest = manifest("includeDirs:\n  alt: resources\n");

    let (assembly, result) = assemble(&tree, &manifest).await;

    assert_eq!(assembly.archive.get("resources/config.yml"), Some(&b"first"[..]));
    assert_eq!(result.count(Severity::Warning), 1);
    assert!(matches!(
        result.diagnostics()[0],
        Diagnostic::Warning { code: WarningCode::DuplicateArchiveEntry, .. }
    ));
}

#[tokio::test]
async fn rooted_file_destination_lands_at_archive_root() {
    let tree = project_tree().with_file("extra/LICENSE", "MIT");
    let manifest = manifest("includeFiles:\n  /extra/LICENSE: /LICENSE\n");

    let (assembly, result) = assemble(&tree, &manifest).await;

    assert_eq!(assembly.archive.get("LICENSE"), Some(&b"MIT"[..]));
    assert!(result.diagnostics().is_empty());
}

#[tokio::test]
async fn unstorable_destination_is_skipped_with_a_warning() {
    let tree = project_tree().with_file("assets/logo.png", "png");
    let manifest = manifest("includeDirs:\n  assets: ../outside\n");

    let (assembly, result) = assemble(&tree, &manifest).await;

    assert!(!assembly.halted);
    assert!(assembly.archive.paths().all(|path| !path.contains("..")));
    assert!(assembly.archive.contains("src/Vendor/Example/Main.php"));
    assert_eq!(result.count(Severity::Warning), 1);
    assert!(matches!(
        &result.diagnostics()[0],
        Diagnostic::Warning { code: WarningCode::InvalidArchivePath, context }
            if context.starts_with("../outside/logo.png")
    ));
}

#[tokio::test]
async fn directory_mapped_bytes_round_trip() {
    let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let tree = project_tree()
        .with_file("resources/blob.bin", binary.clone())
        .with_file("assets/img/logo.png", vec![0x89, b'P', b'N', b'G', 0, 0, 0xff]);
    let manifest = manifest("includeDirs:\n  assets: \"=\"\n");

    let (assembly, _) = assemble(&tree, &manifest).await;

    for (source, destination) in [
        ("resources/blob.bin", "resources/blob.bin"),
        ("assets/img/logo.png", "assets/img/logo.png"),
        ("src/Vendor/Example/Main.php", "src/Vendor/Example/Main.php"),
    ] {
        let original = tree.read(source).unwrap();
        assert_eq!(assembly.archive.get(destination), Some(original.as_slice()));
    }
}

#[tokio::test]
async fn source_files_are_linted_with_entry_point_and_prefix() {
    let tree = MemoryTree::new()
        .with_file(
            "plugin.yml",
            "name: E\nversion: 1.0.0\nmain: Vendor\\E\\Main\napi: 4.0.0\nsrc-namespace-prefix: Vendor\\E\n",
        )
        .with_file("src/Main.php", "<?php")
        .with_file("src/Task.PHP", "<?php")
        .with_file("src/data.json", "{}")
        .with_file("resources/x.php", "<?php");
    let linter = RecordingLinter::default();

    let (_, result) = assemble_with(&tree, &ProjectManifest::default(), &linter, &NoopInjector).await;

    assert!(result.diagnostics().is_empty());
    let sources = linter.sources.lock().unwrap().clone();
    assert_eq!(
        sources,
        vec![
            ("src/Main.php".to_string(), true, "Vendor\\E".to_string(), true),
            ("src/Task.PHP".to_string(), false, "Vendor\\E".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn lint_disabled_is_passed_as_no_config() {
    let tree = MemoryTree::new()
        .with_file("plugin.yml", "name: E\nversion: 1.0.0\nmain: E\\Main\napi: 3.0.0\n")
        .with_file("src/E/Main.php", "<?php");
    let linter = RecordingLinter::default();

    assemble_with(&tree, &manifest("lint: false\n"), &linter, &NoopInjector).await;

    let sources = linter.sources.lock().unwrap().clone();
    assert_eq!(sources, vec![("src/E/Main.php".to_string(), true, String::new(), false)]);
}

#[tokio::test]
async fn injector_gets_the_main_namespace() {
    let injector = RecordingInjector::default();

    let (assembly, result) =
        assemble_with(&project_tree(), &ProjectManifest::default(), &ManifestLinter, &injector).await;

    assert!(result.diagnostics().is_empty());
    assert_eq!(*injector.prefixes.lock().unwrap(), vec!["Vendor\\Example\\".to_string()]);
    assert_eq!(*injector.apis.lock().unwrap(), vec!["4.0.0", "5.0.0"]);
    assert!(assembly.archive.contains("src/Vendor/Example/libs/Lib.php"));
}

#[tokio::test]
async fn injector_failure_is_an_internal_error() {
    let injector = RecordingInjector {
        fail: true,
        ..RecordingInjector::default()
    };

    let (assembly, result) =
        assemble_with(&project_tree(), &ProjectManifest::default(), &ManifestLinter, &injector).await;

    assert!(!assembly.halted);
    assert_eq!(result.count(Severity::Internal), 1);
}

#[tokio::test]
async fn zipball_tree_strips_the_wrapper_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repo.zip");
    {
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory("owner-repo-abc1234/", options).unwrap();
        zip.add_directory("owner-repo-abc1234/src/", options).unwrap();
        for (name, body) in [
            ("owner-repo-abc1234/plugin.yml", PLUGIN_YML),
            ("owner-repo-abc1234/src/Vendor/Example/Main.php", "<?php class Main {}"),
            ("owner-repo-abc1234/.gitignore", "/vendor\n"),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    let tree = ZipballTree::open(&path).unwrap();
    assert!(tree.exists("plugin.yml"));
    assert!(!tree.exists("src/"));
    assert_eq!(tree.locator(), path.as_path());
    assert_eq!(tree.read("src/Vendor/Example/Main.php").unwrap(), b"<?php class Main {}");
    assert!(tree.read("missing.php").is_err());
    let direct: Vec<String> = tree.entries_under("", false).into_iter().map(|e| e.path).collect();
    assert_eq!(direct, vec!["src/", "plugin.yml", ".gitignore"]);

    let (assembly, result) = {
        let ctx = BuildContext::new("Example");
        let mut result = BuildResult::new();
        let assembly = ArchiveAssembler::new(&ManifestLinter, &NoopInjector)
            .assemble(&ctx, &tree, &ProjectManifest::default(), &mut result)
            .await
            .unwrap();
        (assembly, result)
    };
    assert!(result.diagnostics().is_empty());
    assert!(assembly.archive.contains("src/Vendor/Example/Main.php"));
    assert!(!assembly.archive.contains(".gitignore"));
}

fn write_zip(path: &std::path::Path, files: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[tokio::test]
async fn zipball_tree_keeps_a_plain_top_level_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sources.zip");
    write_zip(&path, &[("src/A.php", "<?php"), ("src/B.php", "<?php")]);

    let detected = ZipballTree::open(&path).unwrap();
    assert!(detected.exists("src/A.php"));
    assert!(!detected.exists("A.php"));

    let stripped = ZipballTree::open_with(&path, RootHandling::Strip).unwrap();
    assert!(stripped.exists("A.php"));
}

#[tokio::test]
async fn zipball_tree_can_keep_a_wrapper() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repo.zip");
    write_zip(&path, &[("owner-repo-abc1234/plugin.yml", PLUGIN_YML)]);

    let kept = ZipballTree::open_with(&path, RootHandling::Keep).unwrap();
    assert!(kept.exists("owner-repo-abc1234/plugin.yml"));
    assert!(!kept.exists("plugin.yml"));
}

#[tokio::test]
async fn zipball_open_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not-a.zip");
    std::fs::write(&path, b"plain text").unwrap();
    assert!(ZipballTree::open(&path).is_err());
    assert!(ZipballTree::open(dir.path().join("absent.zip")).is_err());
}

#[tokio::test]
async fn archive_persists_stub_first() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("Example.phar.zip");
    let (assembly, _) = assemble(&project_tree(), &ProjectManifest::default()).await;

    assembly.archive.write_zip(&out).await.unwrap();

    let mut zip = zip::ZipArchive::new(std::fs::File::open(&out).unwrap()).unwrap();
    assert_eq!(zip.len(), assembly.archive.len() + 1);
    assert_eq!(zip.name_for_index(0), Some(STUB_ENTRY));
    assert_eq!(zip.name_for_index(1), Some(SENTINEL_ENTRY));
    let mut main = String::new();
    zip.by_name("src/Vendor/Example/Main.php")
        .unwrap()
        .read_to_string(&mut main)
        .unwrap();
    assert_eq!(main.as_bytes(), assembly.archive.get("src/Vendor/Example/Main.php").unwrap());
}
