//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields. Every
//! record carries the event source, id and correlation id so the lines of one
//! analysis job can be filtered out of a concurrent build.

use plugci_events::{AnalysisEvent, AppEvent, BuildEvent, EventMessage, GeneralEvent, ResolverEvent};
use tracing::{debug, error, info, trace, warn};

/// Log an event using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let event = &message.event;
    let meta = &message.meta;
    match event {
        AppEvent::Build(build_event) => match build_event {
            BuildEvent::Started {
                build_id,
                project,
                project_path,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    build_id = %build_id,
                    project = %project,
                    project_path = %project_path,
                    "Build started"
                );
            }
            BuildEvent::StageSkipped { stage, reason } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    stage = ?stage,
                    reason = %reason,
                    "Build stage skipped"
                );
            }
            BuildEvent::DuplicateEntry { path } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    path = %path,
                    "Duplicate archive entry"
                );
            }
            BuildEvent::Completed {
                build_id,
                worst,
                diagnostics,
                duration_ms,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    build_id = %build_id,
                    worst = %worst,
                    diagnostics = diagnostics,
                    duration_ms = duration_ms,
                    "Build completed"
                );
            }
            BuildEvent::Failed { build_id, failure } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    build_id = %build_id,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Build failed"
                );
            }
            _ => log_fallback(message, "Build event"),
        },

        AppEvent::Analysis(analysis_event) => match analysis_event {
            AnalysisEvent::JobCreated { job_id, api } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    job_id = %job_id,
                    api = %api,
                    "Analysis job created"
                );
            }
            AnalysisEvent::ToolExited {
                job_id,
                exit_code,
                stderr_bytes,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    job_id = %job_id,
                    exit_code = exit_code,
                    stderr_bytes = stderr_bytes,
                    "Analyser exited"
                );
            }
            AnalysisEvent::JobFailed {
                job_id,
                api,
                failure,
            } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    job_id = %job_id,
                    api = %api,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Analysis job failed"
                );
            }
            AnalysisEvent::JobCompleted {
                job_id,
                api,
                findings,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    job_id = %job_id,
                    api = %api,
                    findings = findings,
                    "Analysis job completed"
                );
            }
            AnalysisEvent::TeardownFailed { job_id, failure } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    job_id = %job_id,
                    code = ?failure.code,
                    message = %failure.message,
                    "Sandbox teardown failed"
                );
            }
            _ => log_fallback(message, "Analysis event"),
        },

        AppEvent::Resolver(resolver_event) => match resolver_event {
            ResolverEvent::DependencyResolved { kind, name, path } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    kind = ?kind,
                    name = %name,
                    path = %path.display(),
                    "Dependency resolved"
                );
            }
            ResolverEvent::DependencySkipped { kind, name, reason } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    kind = ?kind,
                    name = %name,
                    reason = %reason,
                    "Dependency skipped"
                );
            }
            _ => log_fallback(message, "Resolver event"),
        },

        AppEvent::General(general_event) => match general_event {
            GeneralEvent::DebugLog { message, context } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    context = ?context,
                    "Debug log"
                );
            }
            GeneralEvent::OperationFailed { operation, failure } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    operation = %operation,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Operation failed"
                );
            }
        },
    }
}

fn log_fallback(message: &EventMessage, label: &'static str) {
    let meta = &message.meta;
    let event = &message.event;
    match meta.tracing_level() {
        tracing::Level::ERROR => {
            error!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
        tracing::Level::WARN => {
            warn!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
        tracing::Level::INFO => {
            info!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
        tracing::Level::DEBUG => {
            debug!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
        tracing::Level::TRACE => {
            trace!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
    }
}
