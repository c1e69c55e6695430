//! Sandboxed static analysis, one job per major API version

mod docker;
mod exit;
mod job;
mod orchestrator;
mod results;
mod runtime;

pub use docker::DockerRuntime;
pub use exit::{crash_lint_message, ExitOutcome};
pub use job::AnalysisJob;
pub use orchestrator::{AnalysisOrchestrator, AnalysisRequest, AnalysisSettings};
pub use results::parse_results;
pub use runtime::{RunOutput, SandboxHandle, SandboxRuntime, SandboxSpec};
