//! Source tree error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SourceError {
    #[error("path not found in source tree: {path}")]
    PathNotFound { path: String },

    #[error("failed to open source archive {path}: {message}")]
    OpenFailed { path: String, message: String },

    #[error("failed to read {path} from source tree: {message}")]
    ReadFailed { path: String, message: String },
}

impl UserFacingError for SourceError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::PathNotFound { .. } => "source.path_not_found",
            Self::OpenFailed { .. } => "source.open_failed",
            Self::ReadFailed { .. } => "source.read_failed",
        })
    }
}
