//! Sandbox runtime contract

use async_trait::async_trait;
use plugci_errors::Error;
use std::collections::BTreeMap;
use std::path::Path;

/// Resource caps, image and environment for one sandbox
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxSpec {
    /// Name the environment is created under; also its handle id
    pub name: String,
    pub image: String,
    pub cpus: String,
    pub memory: String,
    pub env: BTreeMap<String, String>,
}

/// Handle to a provisioned environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxHandle {
    pub id: String,
}

impl SandboxHandle {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Exit status and captured standard error of the analysis tool
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stderr: String,
}

/// Lifecycle contract a sandboxing backend must satisfy
///
/// `destroy` must accept a handle whose `create` failed so cleanup can be
/// attempted on every path.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Provision an environment
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::CreateFailed` or `RuntimeUnavailable`.
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxHandle, Error>;

    /// Copy a local file into the environment
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::CopyFailed`.
    async fn copy_in(&self, handle: &SandboxHandle, local: &Path, remote: &str)
        -> Result<(), Error>;

    /// Run the analysis tool to completion
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::RunFailed` if the tool could not be started at all.
    async fn run(&self, handle: &SandboxHandle) -> Result<RunOutput, Error>;

    /// Copy a file out of the environment
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::CopyFailed`.
    async fn copy_out(&self, handle: &SandboxHandle, remote: &str, local: &Path)
        -> Result<(), Error>;

    /// Remove the environment
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::DestroyFailed`.
    async fn destroy(&self, handle: &SandboxHandle) -> Result<(), Error>;
}
