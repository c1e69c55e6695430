use plugci_types::Severity;
use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Stages of one build invocation, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Stub,
    Manifest,
    TreeWalk,
    Injection,
    Analysis,
}

/// Build-specific events for the event system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    /// Build invocation started
    Started {
        build_id: String,
        project: String,
        project_path: String,
    },

    /// A stage began
    StageStarted { stage: BuildStage },

    /// A stage was not run
    StageSkipped { stage: BuildStage, reason: String },

    /// An entry was written into the package archive
    EntryWritten { path: String, bytes: usize },

    /// A second write to an existing archive path was rejected
    DuplicateEntry { path: String },

    /// A diagnostic was appended to the build result
    DiagnosticRecorded { severity: Severity, summary: String },

    /// Build finished; the result may still carry fatal diagnostics
    Completed {
        build_id: String,
        worst: Severity,
        diagnostics: usize,
        duration_ms: u64,
    },

    /// The pipeline itself failed
    Failed {
        build_id: String,
        failure: FailureContext,
    },
}
