//! Archive assembly: stub, manifest, tree walk, injection

use crate::archive::PackageArchive;
use crate::context::BuildContext;
use crate::inject::DependencyInjector;
use crate::lint::{Linter, SourceLintRequest};
use crate::rules::ArchiveRules;
use crate::source::SourceTree;
use plugci_errors::{ArchiveError, Error, UserFacingError};
use plugci_events::{AppEvent, BuildEvent, BuildStage, EventEmitter, FailureContext};
use plugci_types::{
    dedupe_major_versions, uses_namespace_prefix, BuildErrorCode, BuildResult, Diagnostic,
    LintCode, LintFinding, PluginDescriptor, ProjectManifest, WarningCode, INVALID_MAIN,
    PLUGIN_MANIFEST,
};

/// Empty marker entry identifying packages produced by this system
pub const SENTINEL_ENTRY: &str = ".plugci";

/// Archive path an absolute stub is embedded under
pub const ABSOLUTE_STUB_ENTRY: &str = "stub.php";

/// Bootstrap used when no stub is declared or the declared one is missing
pub const NOOP_STUB: &str = "<?php __HALT_COMPILER();";

/// Outcome of archive assembly
#[derive(Debug)]
pub struct Assembly {
    pub archive: PackageArchive,
    /// Parsed `plugin.yml`, when present and well-formed
    pub plugin: Option<PluginDescriptor>,
    /// Distinct major API versions in declaration order
    pub majors: Vec<String>,
    /// Assembly stopped on a build error; later stages must not run
    pub halted: bool,
}

/// Drives the assembly sequence against a source tree
pub struct ArchiveAssembler<'a> {
    linter: &'a dyn Linter,
    injector: &'a dyn DependencyInjector,
}

impl<'a> ArchiveAssembler<'a> {
    #[must_use]
    pub fn new(linter: &'a dyn Linter, injector: &'a dyn DependencyInjector) -> Self {
        Self { linter, injector }
    }

    /// Assemble the package archive, recording diagnostics into `result`
    ///
    /// # Errors
    ///
    /// Returns an error only for operational failures such as an unreadable
    /// source entry. Problems with the project itself become diagnostics.
    pub async fn assemble(
        &self,
        ctx: &BuildContext,
        tree: &dyn SourceTree,
        manifest: &ProjectManifest,
        result: &mut BuildResult,
    ) -> Result<Assembly, Error> {
        let mut assembly = Assembly {
            archive: PackageArchive::new(),
            plugin: None,
            majors: Vec::new(),
            halted: false,
        };
        let archive = &mut assembly.archive;
        archive.add(SENTINEL_ENTRY, Vec::new())?;

        ctx.emit(AppEvent::Build(BuildEvent::StageStarted {
            stage: BuildStage::Stub,
        }));
        embed_stub(ctx, tree, manifest, archive, result)?;

        ctx.emit(AppEvent::Build(BuildEvent::StageStarted {
            stage: BuildStage::Manifest,
        }));
        let manifest_path = format!("{}{PLUGIN_MANIFEST}", manifest.path);
        if !tree.exists(&manifest_path) {
            ctx.record(
                result,
                Diagnostic::build_error(
                    BuildErrorCode::ManifestMissing,
                    format!("Cannot find {manifest_path} in the repository"),
                ),
            );
            assembly.halted = true;
            return Ok(assembly);
        }

        let manifest_bytes = tree.read(&manifest_path)?;
        let entry_file = self.linter.lint_manifest(ctx, result, &manifest_bytes).await;
        let plugin = PluginDescriptor::parse(&manifest_bytes).ok();
        result.set_main(
            plugin
                .as_ref()
                .and_then(|p| p.main.clone())
                .unwrap_or_else(|| INVALID_MAIN.to_string()),
        );
        write_entry(ctx, result, archive, PLUGIN_MANIFEST.to_string(), manifest_bytes)?;

        if result.has_build_error() {
            assembly.halted = true;
            assembly.plugin = plugin;
            return Ok(assembly);
        }

        let apis = plugin.as_ref().map(|p| p.api.clone()).unwrap_or_default();
        let rules = ArchiveRules::from_manifest(manifest);
        let namespace_prefix = if uses_namespace_prefix(&apis) {
            plugin
                .as_ref()
                .and_then(|p| p.src_namespace_prefix.clone())
                .unwrap_or_default()
        } else {
            String::new()
        };

        ctx.emit(AppEvent::Build(BuildEvent::StageStarted {
            stage: BuildStage::TreeWalk,
        }));
        for entry in tree.entries() {
            if entry.is_dir {
                continue;
            }
            let Some(destination) = rules.destination(&entry.path) else {
                continue;
            };
            let contents = tree.read(&entry.path)?;
            if !write_entry(ctx, result, archive, destination.path.clone(), contents)? {
                continue;
            }

            let path = destination.path.as_str();
            if path.starts_with("src/") && path.to_ascii_lowercase().ends_with(".php") {
                let contents = archive.get(path).unwrap_or_default();
                let request = SourceLintRequest {
                    path,
                    contents,
                    is_entry_point: entry_file.as_deref() == Some(path),
                    namespace_prefix: &namespace_prefix,
                    config: manifest.lint.options(),
                };
                self.linter.lint_source(ctx, result, request).await;
            }
        }

        ctx.emit(AppEvent::Build(BuildEvent::StageStarted {
            stage: BuildStage::Injection,
        }));
        let main_namespace = plugin.as_ref().and_then(PluginDescriptor::main_namespace);
        let prefix_fn = move || main_namespace.clone().unwrap_or_default();
        if let Err(e) = self
            .injector
            .inject_libraries(ctx, archive, tree, manifest, &apis, &prefix_fn)
            .await
        {
            ctx.emit_operation_failed("inject_libraries", FailureContext::from_error(&e));
            ctx.record(
                result,
                Diagnostic::internal(
                    ctx.session_id.clone(),
                    format!("Library injection failed: {}", e.user_message()),
                ),
            );
        }

        let majors = dedupe_major_versions(&apis);
        if let Some(major) = majors.redundant {
            ctx.record(
                result,
                Diagnostic::warning(
                    WarningCode::RedundantApi,
                    format!("API version {major} is declared more than once"),
                ),
            );
        }

        assembly.majors = majors.versions;
        assembly.plugin = plugin;
        Ok(assembly)
    }
}

/// Embed the declared stub, falling back to the no-op bootstrap
fn embed_stub(
    ctx: &BuildContext,
    tree: &dyn SourceTree,
    manifest: &ProjectManifest,
    archive: &mut PackageArchive,
    result: &mut BuildResult,
) -> Result<(), Error> {
    let Some(stub) = manifest.stub.as_deref().filter(|s| !s.is_empty()) else {
        archive.set_stub(NOOP_STUB);
        return Ok(());
    };

    let (source, entry) = match stub.strip_prefix('/') {
        Some(rooted) => (rooted.to_string(), ABSOLUTE_STUB_ENTRY.to_string()),
        None => {
            let path = format!("{}{stub}", manifest.path);
            (path.clone(), path)
        }
    };

    if !tree.exists(&source) {
        ctx.record(
            result,
            LintFinding::new(
                LintCode::PromisedStubMissing,
                format!("The stub {source} declared in the manifest does not exist"),
            )
            .with_file(source),
        );
        archive.set_stub(NOOP_STUB);
        return Ok(());
    }

    let contents = tree.read(&source)?;
    write_entry(ctx, result, archive, entry.clone(), contents)?;
    archive.set_stub(bootstrap_stub(&entry));
    Ok(())
}

/// Bootstrap that requires `entry` from inside the package at load time
fn bootstrap_stub(entry: &str) -> String {
    let quoted = entry.replace('\\', "\\\\").replace('\'', "\\'");
    format!("<?php require \"phar://\" . __FILE__ . \"/\" . '{quoted}'; __HALT_COMPILER();")
}

/// Write an entry, turning a repeated path into a warning
///
/// Returns whether the entry was written.
fn write_entry(
    ctx: &BuildContext,
    result: &mut BuildResult,
    archive: &mut PackageArchive,
    path: String,
    contents: Vec<u8>,
) -> Result<bool, Error> {
    let bytes = contents.len();
    match archive.add(path.clone(), contents) {
        Ok(()) => {
            ctx.emit(AppEvent::Build(BuildEvent::EntryWritten { path, bytes }));
            Ok(true)
        }
        Err(Error::Archive(ArchiveError::DuplicateEntry { path })) => {
            ctx.emit(AppEvent::Build(BuildEvent::DuplicateEntry { path: path.clone() }));
            ctx.record(
                result,
                Diagnostic::warning(
                    WarningCode::DuplicateArchiveEntry,
                    format!("{path} is written more than once; the first copy is kept"),
                ),
            );
            Ok(false)
        }
        Err(Error::Archive(ArchiveError::InvalidPath { path })) => {
            ctx.record(
                result,
                Diagnostic::warning(
                    WarningCode::InvalidArchivePath,
                    format!("{path} is not a valid archive path; the file is skipped"),
                ),
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
