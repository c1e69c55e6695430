//! Build result: the ordered diagnostics of one build invocation

use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, Severity};

/// Main class placeholder before `plugin.yml` has been read
pub const UNRESOLVED_MAIN: &str = "(unresolved)";

/// Main class placeholder when `plugin.yml` does not yield one
pub const INVALID_MAIN: &str = "(Invalid plugin.yml in build)";

/// Append-only diagnostics collection with a running worst severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    diagnostics: Vec<Diagnostic>,
    worst: Severity,
    main: String,
}

impl Default for BuildResult {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildResult {
    #[must_use]
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            worst: Severity::Ok,
            main: UNRESOLVED_MAIN.to_string(),
        }
    }

    /// Append a diagnostic, keeping insertion order
    pub fn add(&mut self, diagnostic: impl Into<Diagnostic>) {
        let diagnostic = diagnostic.into();
        self.worst = self.worst.max(diagnostic.severity());
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.add(diagnostic);
        }
    }

    #[must_use]
    pub fn worst_severity(&self) -> Severity {
        self.worst
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn has_build_error(&self) -> bool {
        self.worst == Severity::BuildError
    }

    /// Number of diagnostics at exactly the given severity
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == severity)
            .count()
    }

    #[must_use]
    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn set_main(&mut self, main: impl Into<String>) {
        self.main = main.into();
    }
}
