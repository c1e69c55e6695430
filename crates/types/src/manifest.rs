//! Project manifest model
//!
//! A project entry from the repository's CI manifest: which directories and
//! files enter the archive, what is excluded, how linting is configured, and
//! which libraries the project declares. Immutable once parsed.

use std::collections::BTreeMap;

use plugci_errors::ManifestError;
use serde::{Deserialize, Serialize};
use serde_yml::Value;

use crate::scalar_list;

/// Parsed project entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    /// Project subdirectory inside the repository; empty for the root,
    /// otherwise ending in `/`
    #[serde(default, deserialize_with = "deserialize_project_path")]
    pub path: String,
    /// Optional bootstrap stub, absolute (`/x.php`) or project-relative
    #[serde(default, deserialize_with = "scalar_list::optional_string")]
    pub stub: Option<String>,
    /// Directory mappings in declaration order
    #[serde(default, deserialize_with = "scalar_list::ordered_pairs")]
    pub include_dirs: Vec<(String, String)>,
    /// Exact file mappings
    #[serde(default, deserialize_with = "scalar_list::ordered_pairs")]
    pub include_files: Vec<(String, String)>,
    /// Files never copied by a directory mapping
    #[serde(default, deserialize_with = "scalar_list::strings")]
    pub exclude_files: Vec<String>,
    /// Directory prefixes never copied by a directory mapping
    #[serde(default, deserialize_with = "scalar_list::strings")]
    pub exclude_dirs: Vec<String>,
    /// Lint toggle and options
    #[serde(default)]
    pub lint: LintConfig,
    /// Declared library (virion) dependencies
    #[serde(default)]
    pub libs: Vec<LibraryDeclaration>,
}

impl ProjectManifest {
    /// Parse a single project entry from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML or a field has the
    /// wrong shape.
    pub fn from_yaml(source: &str) -> Result<Self, ManifestError> {
        serde_yml::from_str(source).map_err(|e| ManifestError::ParseError {
            file: ".poggit.yml".to_string(),
            message: e.to_string(),
        })
    }

    /// Parse the named project out of a full CI manifest (`projects:` mapping).
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or does not declare
    /// the project.
    pub fn from_ci_manifest(source: &str, project: &str) -> Result<Self, ManifestError> {
        #[derive(Deserialize)]
        struct CiManifest {
            #[serde(default)]
            projects: BTreeMap<String, ProjectManifest>,
        }

        let mut manifest: CiManifest =
            serde_yml::from_str(source).map_err(|e| ManifestError::ParseError {
                file: ".poggit.yml".to_string(),
                message: e.to_string(),
            })?;
        manifest
            .projects
            .remove(project)
            .ok_or_else(|| ManifestError::MissingField {
                file: ".poggit.yml".to_string(),
                field: format!("projects.{project}"),
            })
    }

    /// Whether static analysis should run after assembly
    #[must_use]
    pub fn static_analysis_enabled(&self) -> bool {
        match &self.lint {
            LintConfig::Disabled => false,
            LintConfig::Enabled(options) => options.static_analysis,
        }
    }
}

fn deserialize_project_path<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = scalar_list::optional_string(deserializer)?.unwrap_or_default();
    let trimmed = raw.trim_matches('/');
    Ok(if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    })
}

/// Lint configuration: `false` disables, `true`/absent enables with defaults,
/// a mapping enables with options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLintConfig")]
pub enum LintConfig {
    Disabled,
    Enabled(LintOptions),
}

impl Default for LintConfig {
    fn default() -> Self {
        Self::Enabled(LintOptions::default())
    }
}

impl LintConfig {
    /// Options when enabled
    #[must_use]
    pub fn options(&self) -> Option<&LintOptions> {
        match self {
            Self::Disabled => None,
            Self::Enabled(options) => Some(options),
        }
    }
}

/// Options passed through to the linter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintOptions {
    /// `phpstan` key; static analysis runs unless explicitly `false`
    pub static_analysis: bool,
    /// Every declared option, including the ones interpreted here
    pub options: BTreeMap<String, Value>,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            static_analysis: true,
            options: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLintConfig {
    Unset(()),
    Flag(bool),
    Options(BTreeMap<String, Value>),
}

impl From<RawLintConfig> for LintConfig {
    fn from(raw: RawLintConfig) -> Self {
        match raw {
            RawLintConfig::Flag(false) => Self::Disabled,
            RawLintConfig::Unset(()) | RawLintConfig::Flag(true) => Self::default(),
            RawLintConfig::Options(options) => {
                let static_analysis = options
                    .get("phpstan")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                Self::Enabled(LintOptions {
                    static_analysis,
                    options,
                })
            }
        }
    }
}

/// A declared library dependency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDeclaration {
    /// `owner/repo/name`, `repo/name` or `name`; entries without it are left
    /// to the injection collaborator
    #[serde(default, deserialize_with = "scalar_list::optional_string")]
    pub src: Option<String>,
    /// Version constraint, `*` when absent
    #[serde(default, deserialize_with = "scalar_list::optional_string")]
    pub version: Option<String>,
    /// Branch selector, `:default` when absent
    #[serde(default, deserialize_with = "scalar_list::optional_string")]
    pub branch: Option<String>,
}
