//! Package archive error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ArchiveError {
    #[error("archive entry already written: {path}")]
    DuplicateEntry { path: String },

    #[error("invalid archive entry path: {path}")]
    InvalidPath { path: String },

    #[error("zip error: {message}")]
    Zip { message: String },
}

impl UserFacingError for ArchiveError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::DuplicateEntry { .. } => "archive.duplicate_entry",
            Self::InvalidPath { .. } => "archive.invalid_path",
            Self::Zip { .. } => "archive.zip",
        })
    }
}
