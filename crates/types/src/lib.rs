#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the plugci build pipeline
//!
//! This crate provides the data model shared by every stage: the parsed
//! project manifest and `plugin.yml` descriptor, API version helpers, and the
//! diagnostics that make up a build result.

pub mod api;
pub mod diagnostic;
pub mod job;
pub mod manifest;
pub mod plugin;
pub mod result;
pub mod scalar_list;

// Re-export commonly used types
pub use api::{dedupe_major_versions, major_version, uses_namespace_prefix, MajorVersions};
pub use diagnostic::{BuildErrorCode, Diagnostic, LintCode, LintFinding, Severity, WarningCode};
pub use job::{DependencyKind, JobState};
pub use manifest::{LibraryDeclaration, LintConfig, LintOptions, ProjectManifest};
pub use plugin::{PluginDescriptor, PLUGIN_MANIFEST};
pub use result::{BuildResult, INVALID_MAIN, UNRESOLVED_MAIN};

use serde::{Deserialize, Serialize};

/// Output format for CLI reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Plain
    }
}

impl clap::ValueEnum for OutputFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Plain, Self::Json]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Plain => clap::builder::PossibleValue::new("plain"),
            Self::Json => clap::builder::PossibleValue::new("json"),
        })
    }
}
