//! Docker CLI sandbox runtime

use super::runtime::{RunOutput, SandboxHandle, SandboxRuntime, SandboxSpec};
use async_trait::async_trait;
use plugci_errors::{Error, SandboxError};
use std::path::Path;
use std::process::Output;
use tokio::process::Command;

/// Sandbox runtime driving the `docker` command line
#[derive(Clone, Debug)]
pub struct DockerRuntime {
    binary: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerRuntime {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn exec(&self, args: &[String]) -> Result<Output, Error> {
        Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                SandboxError::RuntimeUnavailable {
                    program: self.binary.clone(),
                    message: e.to_string(),
                }
                .into()
            })
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim_end().to_string()
}

/// `docker create` arguments for a spec
fn create_args(spec: &SandboxSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        format!("--cpus={}", spec.cpus),
        format!("--memory={}", spec.memory),
    ];
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push("--name".to_string());
    args.push(spec.name.clone());
    args.push(spec.image.clone());
    args
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxHandle, Error> {
        let output = self.exec(&create_args(spec)).await?;
        if !output.status.success() {
            return Err(SandboxError::CreateFailed {
                id: spec.name.clone(),
                message: stderr_of(&output),
            }
            .into());
        }
        Ok(SandboxHandle::new(spec.name.clone()))
    }

    async fn copy_in(
        &self,
        handle: &SandboxHandle,
        local: &Path,
        remote: &str,
    ) -> Result<(), Error> {
        let to = format!("{}:{remote}", handle.id);
        let args = vec!["cp".to_string(), local.display().to_string(), to.clone()];
        let output = self.exec(&args).await?;
        if !output.status.success() {
            return Err(SandboxError::CopyFailed {
                from: local.display().to_string(),
                to,
                message: stderr_of(&output),
            }
            .into());
        }
        Ok(())
    }

    async fn run(&self, handle: &SandboxHandle) -> Result<RunOutput, Error> {
        let args = vec!["start".to_string(), "-a".to_string(), handle.id.clone()];
        let output = self.exec(&args).await?;
        // Killed by a signal: there is no exit code to interpret
        let exit_code = output.status.code().ok_or_else(|| SandboxError::RunFailed {
            id: handle.id.clone(),
            message: "container terminated by signal".to_string(),
        })?;
        Ok(RunOutput {
            exit_code,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn copy_out(
        &self,
        handle: &SandboxHandle,
        remote: &str,
        local: &Path,
    ) -> Result<(), Error> {
        let from = format!("{}:{remote}", handle.id);
        let args = vec!["cp".to_string(), from.clone(), local.display().to_string()];
        let output = self.exec(&args).await?;
        if !output.status.success() {
            return Err(SandboxError::CopyFailed {
                from,
                to: local.display().to_string(),
                message: stderr_of(&output),
            }
            .into());
        }
        Ok(())
    }

    async fn destroy(&self, handle: &SandboxHandle) -> Result<(), Error> {
        let args = vec![
            "container".to_string(),
            "rm".to_string(),
            "--force".to_string(),
            handle.id.clone(),
        ];
        let output = self.exec(&args).await?;
        if !output.status.success() {
            return Err(SandboxError::DestroyFailed {
                id: handle.id.clone(),
                message: stderr_of(&output),
            }
            .into());
        }
        Ok(())
    }
}
