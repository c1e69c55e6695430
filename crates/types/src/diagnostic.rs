//! Typed build diagnostics

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity rank of a diagnostic
///
/// Ordering is significant: the build result tracks the maximum, and later
/// stages compare against it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Lint,
    Internal,
    BuildError,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Lint => "lint",
            Self::Internal => "internal error",
            Self::BuildError => "build error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildErrorCode {
    /// `plugin.yml` does not exist at the project path
    ManifestMissing,
    /// `plugin.yml` is not a valid YAML mapping
    ManifestCorrupted,
    /// `plugin.yml` lacks a required attribute
    ManifestMissingField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LintCode {
    /// The manifest names a stub file that is not in the source tree
    PromisedStubMissing,
    /// Reported by the sandboxed static analyser
    StaticAnalysis,
    /// Reported by the per-file source linter
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// A major API version is declared more than once
    RedundantApi,
    /// Two inclusion rules mapped different files onto one archive path
    DuplicateArchiveEntry,
    /// A mapping produced an archive path that cannot be stored
    InvalidArchivePath,
}

/// A file-scoped, non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintFinding {
    pub code: LintCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,
}

impl LintFinding {
    #[must_use]
    pub fn new(code: LintCode, message: impl Into<String>) -> Self {
        Self {
            code,
            source_file: None,
            line: None,
            message: message.into(),
            target_version: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    #[must_use]
    pub fn with_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }

    #[must_use]
    pub fn with_target(mut self, version: impl Into<String>) -> Self {
        self.target_version = Some(version.into());
        self
    }
}

/// One entry of a build report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Fatal: halts the current stage and every later one
    BuildError {
        code: BuildErrorCode,
        context: String,
    },
    Lint(LintFinding),
    /// Infrastructure fault; the message is generic and the incident id
    /// correlates it with the logs
    InternalError { incident_id: String, message: String },
    Warning { code: WarningCode, context: String },
}

impl Diagnostic {
    #[must_use]
    pub fn build_error(code: BuildErrorCode, context: impl Into<String>) -> Self {
        Self::BuildError {
            code,
            context: context.into(),
        }
    }

    #[must_use]
    pub fn internal(incident_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InternalError {
            incident_id: incident_id.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(code: WarningCode, context: impl Into<String>) -> Self {
        Self::Warning {
            code,
            context: context.into(),
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::BuildError { .. } => Severity::BuildError,
            Self::Lint(_) => Severity::Lint,
            Self::InternalError { .. } => Severity::Internal,
            Self::Warning { .. } => Severity::Warning,
        }
    }
}

impl From<LintFinding> for Diagnostic {
    fn from(finding: LintFinding) -> Self {
        Self::Lint(finding)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildError { context, .. } => write!(f, "[build error] {context}"),
            Self::Lint(finding) => {
                f.write_str("[lint]")?;
                if let Some(version) = &finding.target_version {
                    write!(f, " (api {version})")?;
                }
                if let Some(file) = &finding.source_file {
                    write!(f, " {file}")?;
                    if let Some(line) = finding.line {
                        write!(f, ":{line}")?;
                    }
                    f.write_str(":")?;
                }
                write!(f, " {}", finding.message)
            }
            Self::InternalError {
                incident_id,
                message,
            } => write!(f, "[internal error] {message} (incident {incident_id})"),
            Self::Warning { context, .. } => write!(f, "[warning] {context}"),
        }
    }
}
