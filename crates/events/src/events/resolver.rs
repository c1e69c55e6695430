use plugci_types::DependencyKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Resolver domain events for dependency resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolverEvent {
    /// Resolution of one dependency kind started
    ResolutionStarted { kind: DependencyKind, declared: usize },

    /// Dependency mapped to a local artifact
    DependencyResolved {
        kind: DependencyKind,
        name: String,
        path: PathBuf,
    },

    /// Dependency dropped; the build continues without it
    DependencySkipped {
        kind: DependencyKind,
        name: String,
        reason: String,
    },

    /// Resolution of one dependency kind finished
    ResolutionCompleted {
        kind: DependencyKind,
        resolved: usize,
        skipped: usize,
    },
}
