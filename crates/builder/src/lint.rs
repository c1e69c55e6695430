//! Manifest and source-file linting

use crate::context::BuildContext;
use async_trait::async_trait;
use plugci_types::{
    uses_namespace_prefix, BuildErrorCode, BuildResult, Diagnostic, LintCode, LintFinding,
    LintOptions, PluginDescriptor, PLUGIN_MANIFEST,
};

/// A source file handed to the linter after it was written to the archive
#[derive(Clone, Copy, Debug)]
pub struct SourceLintRequest<'a> {
    /// Destination path inside the archive
    pub path: &'a str,
    pub contents: &'a [u8],
    /// Whether this file holds the declared entry-point class
    pub is_entry_point: bool,
    /// Required namespace prefix; empty when none applies
    pub namespace_prefix: &'a str,
    /// `None` when linting is disabled for the project
    pub config: Option<&'a LintOptions>,
}

/// Linter collaborator
#[async_trait]
pub trait Linter: Send + Sync {
    /// Validate raw `plugin.yml` bytes, recording any findings
    ///
    /// Returns the archive path of the entry-point file when it can be
    /// derived from the manifest.
    async fn lint_manifest(
        &self,
        ctx: &BuildContext,
        result: &mut BuildResult,
        manifest: &[u8],
    ) -> Option<String>;

    /// Lint one source file written to the archive
    async fn lint_source(
        &self,
        ctx: &BuildContext,
        result: &mut BuildResult,
        request: SourceLintRequest<'_>,
    );
}

/// Built-in linter covering manifest structure and basic source sanity
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifestLinter;

impl ManifestLinter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Linter for ManifestLinter {
    async fn lint_manifest(
        &self,
        ctx: &BuildContext,
        result: &mut BuildResult,
        manifest: &[u8],
    ) -> Option<String> {
        let descriptor = match PluginDescriptor::parse(manifest) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                ctx.record(
                    result,
                    Diagnostic::build_error(
                        BuildErrorCode::ManifestCorrupted,
                        format!("{PLUGIN_MANIFEST} is corrupted: {e}"),
                    ),
                );
                return None;
            }
        };

        let missing = [
            ("name", descriptor.name.is_none()),
            ("version", descriptor.version.is_none()),
            ("main", descriptor.main.is_none()),
            ("api", descriptor.api.is_empty()),
        ];
        for (field, absent) in missing {
            if absent {
                ctx.record(
                    result,
                    Diagnostic::build_error(
                        BuildErrorCode::ManifestMissingField,
                        format!("{PLUGIN_MANIFEST} is missing the required field '{field}'"),
                    ),
                );
            }
        }

        entry_point_file(&descriptor)
    }

    async fn lint_source(
        &self,
        ctx: &BuildContext,
        result: &mut BuildResult,
        request: SourceLintRequest<'_>,
    ) {
        if request.config.is_none() {
            return;
        }

        let text = String::from_utf8_lossy(request.contents);
        if !text.trim_start_matches('\u{feff}').starts_with("<?php") {
            ctx.record(
                result,
                LintFinding::new(LintCode::Source, "file does not start with an opening <?php tag")
                    .with_file(request.path),
            );
            return;
        }

        let prefix = request.namespace_prefix.trim_end_matches('\\');
        if prefix.is_empty() {
            return;
        }
        if let Some((line, namespace)) = declared_namespace(&text) {
            if namespace != prefix && !namespace.starts_with(&format!("{prefix}\\")) {
                ctx.record(
                    result,
                    LintFinding::new(
                        LintCode::Source,
                        format!("namespace {namespace} is outside the declared prefix {prefix}"),
                    )
                    .with_file(request.path)
                    .with_line(Some(line)),
                );
            }
        }
    }
}

/// `src/<main without namespace prefix>.php`
fn entry_point_file(descriptor: &PluginDescriptor) -> Option<String> {
    let main = descriptor.main.as_deref()?.trim_start_matches('\\');
    let prefix = descriptor
        .src_namespace_prefix
        .as_deref()
        .filter(|_| uses_namespace_prefix(&descriptor.api))
        .map(|prefix| prefix.trim_matches('\\'))
        .filter(|prefix| !prefix.is_empty());

    let relative = match prefix {
        Some(prefix) => main
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('\\'))
            .unwrap_or(main),
        None => main,
    };
    Some(format!("src/{}.php", relative.replace('\\', "/")))
}

/// First `namespace X;` declaration with its 1-based line number
fn declared_namespace(text: &str) -> Option<(u32, &str)> {
    text.lines().enumerate().find_map(|(i, line)| {
        let rest = line.trim_start().strip_prefix("namespace ")?;
        let name = rest.split(|c| c == ';' || c == '{').next()?.trim();
        let line_no = u32::try_from(i + 1).ok()?;
        Some((line_no, name))
    })
}
