//! Analysis job lifecycle

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of one per-version analysis job
///
/// States only move forward. `Skipped` and `ResultsExtracted` are both
/// terminal outcomes of execution; `TornDown` follows every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    ContainerProvisioned,
    SourceTransferred,
    DependenciesTransferred,
    Executed,
    ResultsExtracted,
    Skipped,
    TornDown,
}

impl JobState {
    /// Whether moving from `self` to `next` is a forward transition
    #[must_use]
    pub fn can_advance_to(self, next: JobState) -> bool {
        match (self, next) {
            (Self::TornDown, _) => false,
            // an aborted job goes straight to teardown from any live state
            (_, Self::TornDown) => true,
            // results and skip are alternative outcomes of the same step
            (Self::ResultsExtracted, Self::Skipped) | (Self::Skipped, Self::ResultsExtracted) => {
                false
            }
            (current, next) => next > current,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::ContainerProvisioned => "container_provisioned",
            Self::SourceTransferred => "source_transferred",
            Self::DependenciesTransferred => "dependencies_transferred",
            Self::Executed => "executed",
            Self::ResultsExtracted => "results_extracted",
            Self::Skipped => "skipped",
            Self::TornDown => "torn_down",
        })
    }
}

/// The two independent dependency kinds a build resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Library code from another project's build
    Virion,
    /// Plugin named in `depend`/`softdepend`
    Plugin,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Virion => "virion",
            Self::Plugin => "plugin",
        })
    }
}
