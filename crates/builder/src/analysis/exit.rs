//! Exit-code protocol of the analysis tool

/// Interpretation of the analysis tool's exit code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// 0: analysis passed
    Clean,
    /// 6: analysis completed and wrote a results file
    Findings,
    /// 3
    PackageExtractionFailed,
    /// 4
    DependencyExtractionFailed,
    /// 5
    DependencyInstallFailed,
    /// 7: the tool crashed, possibly on unparsable source
    Crashed,
    /// 8: unknown failure, stderr carries the tool's own explanation
    ToolFailure,
    /// Anything outside the protocol
    Unhandled(i32),
}

impl ExitOutcome {
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Clean,
            6 => Self::Findings,
            3 => Self::PackageExtractionFailed,
            4 => Self::DependencyExtractionFailed,
            5 => Self::DependencyInstallFailed,
            7 => Self::Crashed,
            8 => Self::ToolFailure,
            other => Self::Unhandled(other),
        }
    }

    /// Short phrase for the internal error reported on this outcome
    #[must_use]
    pub fn failure_phrase(self) -> Option<&'static str> {
        match self {
            Self::Clean | Self::Findings => None,
            Self::PackageExtractionFailed => Some("failed to extract the plugin"),
            Self::DependencyExtractionFailed => Some("failed to extract dependencies"),
            Self::DependencyInstallFailed => Some("failed to install dependencies"),
            Self::Crashed => Some("the analysis tool crashed"),
            Self::ToolFailure => Some("failed to run analysis"),
            Self::Unhandled(_) => Some("exited with an unhandled status"),
        }
    }
}

/// Stderr markers of a crash caused by the analyzed source itself
const CRASH_MARKERS: [&str; 2] = ["Parse error", "Fatal error"];

/// Lint message for a crash caused by the analyzed source, if it was one
#[must_use]
pub fn crash_lint_message(stderr: &str, source_prefix: &str) -> Option<String> {
    if !CRASH_MARKERS.iter().any(|marker| stderr.starts_with(marker)) {
        return None;
    }
    Some(strip_prefix_all(stderr, source_prefix))
}

/// Remove every occurrence of the in-sandbox source prefix
#[must_use]
pub fn strip_prefix_all(text: &str, source_prefix: &str) -> String {
    if source_prefix.is_empty() {
        text.to_string()
    } else {
        text.replace(source_prefix, "")
    }
}
