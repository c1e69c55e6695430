#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package assembly and sandboxed static analysis
//!
//! The [`Builder`] turns a [`SourceTree`] and a [`ProjectManifest`] into a
//! [`PackageArchive`] plus an ordered [`BuildResult`]. Linting, library
//! injection, dependency lookups and sandboxing are collaborators behind
//! traits so each can be replaced.
//!
//! [`ProjectManifest`]: plugci_types::ProjectManifest
//! [`BuildResult`]: plugci_types::BuildResult

pub mod analysis;
mod archive;
mod assembler;
mod builder;
mod context;
mod inject;
mod lint;
mod rules;
mod source;
mod utils;

pub use analysis::{
    AnalysisJob, AnalysisOrchestrator, AnalysisRequest, AnalysisSettings, DockerRuntime,
    ExitOutcome, RunOutput, SandboxHandle, SandboxRuntime, SandboxSpec,
};
pub use archive::{PackageArchive, STUB_ENTRY};
pub use assembler::{ArchiveAssembler, Assembly, ABSOLUTE_STUB_ENTRY, NOOP_STUB, SENTINEL_ENTRY};
pub use builder::{BuildOutput, Builder};
pub use context::BuildContext;
pub use inject::{DependencyInjector, NamespacePrefixFn, NoopInjector};
pub use lint::{Linter, ManifestLinter, SourceLintRequest};
pub use rules::{ArchiveRules, Destination};
pub use source::{MemoryTree, RootHandling, SourceEntry, SourceTree, ZipballTree};
