use plugci_types::JobState;
use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Sandboxed static-analysis events, one stream per job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// Job scheduled for a supported major version
    JobCreated { job_id: String, api: String },

    /// Job moved to a new lifecycle state
    JobTransition { job_id: String, state: JobState },

    /// The analysis tool exited
    ToolExited {
        job_id: String,
        exit_code: i32,
        stderr_bytes: usize,
    },

    /// Declared major version has no analysis image
    UnsupportedVersion { api: String },

    /// Job aborted; the underlying cause stays out of the build report
    JobFailed {
        job_id: String,
        api: String,
        failure: FailureContext,
    },

    /// Job finished without aborting
    JobCompleted {
        job_id: String,
        api: String,
        findings: usize,
    },

    /// Environment kept for inspection
    TeardownSkipped { job_id: String },

    /// Removing the environment failed
    TeardownFailed {
        job_id: String,
        failure: FailureContext,
    },
}
