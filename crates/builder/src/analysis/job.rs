use crate::context::BuildContext;
use plugci_events::{AnalysisEvent, AppEvent, EventEmitter};
use plugci_types::JobState;

/// One sandboxed analysis run for a single major API version
#[derive(Clone, Debug)]
pub struct AnalysisJob {
    pub id: String,
    pub api: String,
    state: JobState,
}

impl AnalysisJob {
    #[must_use]
    pub fn new(id: impl Into<String>, api: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            api: api.into(),
            state: JobState::Created,
        }
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move forward to `next`; backward moves are ignored
    pub fn advance(&mut self, ctx: &BuildContext, next: JobState) -> bool {
        if !self.state.can_advance_to(next) {
            return false;
        }
        self.state = next;
        ctx.emit(AppEvent::Analysis(AnalysisEvent::JobTransition {
            job_id: self.id.clone(),
            state: next,
        }));
        true
    }
}
