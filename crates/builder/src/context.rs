//! Build context threaded through every stage of a build

use plugci_events::{AppEvent, BuildEvent, EventEmitter, EventSender};
use plugci_resolver::RepoRef;
use plugci_types::{BuildResult, Diagnostic};
use tokio::sync::watch;
use uuid::Uuid;

/// Explicit per-build context
///
/// Carries the identifiers used to correlate diagnostics with logs, the event
/// channel, the inspection flag and the cancellation signal.
#[derive(Clone, Debug)]
pub struct BuildContext {
    /// Unique build identifier
    pub build_id: Uuid,
    /// Short random identifier shared by every job of this build
    pub session_id: String,
    /// Project name from the CI manifest
    pub project_name: String,
    /// Repository the project lives in
    pub repo: RepoRef,
    /// Event sender for progress reporting
    pub event_sender: Option<EventSender>,
    /// Leave sandboxes and scratch files behind for inspection
    pub debug: bool,
    cancel: Option<watch::Receiver<bool>>,
    job_prefix: String,
}

impl EventEmitter for BuildContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }

    fn correlation_id(&self) -> Option<&str> {
        Some(&self.session_id)
    }
}

impl BuildContext {
    /// Create new build context
    #[must_use]
    pub fn new(project_name: impl Into<String>) -> Self {
        let session_id = short_hex(8);
        let job_prefix = format!("phpstan-{}-{}", &session_id[..4], short_hex(8));
        Self {
            build_id: Uuid::new_v4(),
            session_id,
            project_name: project_name.into(),
            repo: RepoRef::default(),
            event_sender: None,
            debug: false,
            cancel: None,
            job_prefix,
        }
    }

    /// Set the repository the project lives in
    #[must_use]
    pub fn with_repo(mut self, repo: RepoRef) -> Self {
        self.repo = repo;
        self
    }

    /// Set event sender
    #[must_use]
    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    /// Enable inspection mode
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Attach a cancellation signal; the build is cancelled once it reads `true`
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Identifier of the analysis job for a major API version
    #[must_use]
    pub fn job_id(&self, major: &str) -> String {
        format!("{}-{major}", self.job_prefix)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the build is cancelled; never resolves without a signal
    pub async fn cancelled(&self) {
        if let Some(rx) = &self.cancel {
            let mut rx = rx.clone();
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }

    /// Append a diagnostic to the result and report it
    pub fn record(&self, result: &mut BuildResult, diagnostic: impl Into<Diagnostic>) {
        let diagnostic = diagnostic.into();
        self.emit(AppEvent::Build(BuildEvent::DiagnosticRecorded {
            severity: diagnostic.severity(),
            summary: diagnostic.to_string(),
        }));
        result.add(diagnostic);
    }
}

fn short_hex(len: usize) -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(len);
    hex
}
