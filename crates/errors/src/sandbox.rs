//! Sandbox runtime error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SandboxError {
    #[error("failed to create environment {id}: {message}")]
    CreateFailed { id: String, message: String },

    #[error("failed to copy {from} to {to}: {message}")]
    CopyFailed {
        from: String,
        to: String,
        message: String,
    },

    #[error("failed to run environment {id}: {message}")]
    RunFailed { id: String, message: String },

    #[error("environment {id} timed out after {seconds} seconds")]
    Timeout { id: String, seconds: u64 },

    #[error("failed to remove environment {id}: {message}")]
    DestroyFailed { id: String, message: String },

    #[error("failed to launch sandbox runtime `{program}`: {message}")]
    RuntimeUnavailable { program: String, message: String },
}

impl UserFacingError for SandboxError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::RuntimeUnavailable { .. } => {
                Some("Install the sandbox runtime or disable analysis with --no-analysis.")
            }
            Self::Timeout { .. } => Some("Raise analysis.run_timeout_secs if analysis is slow."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CreateFailed { .. } | Self::CopyFailed { .. } | Self::Timeout { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::CreateFailed { .. } => "sandbox.create_failed",
            Self::CopyFailed { .. } => "sandbox.copy_failed",
            Self::RunFailed { .. } => "sandbox.run_failed",
            Self::Timeout { .. } => "sandbox.timeout",
            Self::DestroyFailed { .. } => "sandbox.destroy_failed",
            Self::RuntimeUnavailable { .. } => "sandbox.runtime_unavailable",
        })
    }
}
