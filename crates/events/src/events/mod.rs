use serde::{Deserialize, Serialize};

use crate::EventSource;
use plugci_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code, when the error has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod analysis;
pub mod build;
pub mod general;
pub mod resolver;

pub use analysis::*;
pub use build::*;
pub use general::*;
pub use resolver::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Archive assembly and build lifecycle
    Build(BuildEvent),

    /// Sandboxed static-analysis jobs
    Analysis(AnalysisEvent),

    /// Virion and plugin dependency resolution
    Resolver(ResolverEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Build(_) => EventSource::BUILD,
            Self::Analysis(_) => EventSource::ANALYSIS,
            Self::Resolver(_) => EventSource::RESOLVER,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::OperationFailed { .. })
            | Self::Build(BuildEvent::Failed { .. })
            | Self::Analysis(
                AnalysisEvent::JobFailed { .. } | AnalysisEvent::TeardownFailed { .. },
            ) => Level::ERROR,

            Self::Build(BuildEvent::DuplicateEntry { .. })
            | Self::Analysis(AnalysisEvent::UnsupportedVersion { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Build(BuildEvent::DiagnosticRecorded { .. })
            | Self::Analysis(
                AnalysisEvent::JobTransition { .. } | AnalysisEvent::ToolExited { .. },
            )
            | Self::Resolver(
                ResolverEvent::DependencySkipped { .. } | ResolverEvent::ResolutionStarted { .. },
            ) => Level::DEBUG,

            Self::Build(BuildEvent::EntryWritten { .. }) => Level::TRACE,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "plugci::events::general",
            Self::Build(_) => "plugci::events::build",
            Self::Analysis(_) => "plugci::events::analysis",
            Self::Resolver(_) => "plugci::events::resolver",
        }
    }
}
