//! Manifest (project entry and `plugin.yml`) error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ManifestError {
    #[error("failed to parse {file}: {message}")]
    ParseError { file: String, message: String },

    #[error("{file} is missing required field `{field}`")]
    MissingField { file: String, field: String },

    #[error("invalid value for `{field}` in {file}: {message}")]
    InvalidValue {
        file: String,
        field: String,
        message: String,
    },
}

impl UserFacingError for ManifestError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ParseError { .. } => Some("Check the YAML syntax of the manifest."),
            Self::MissingField { .. } | Self::InvalidValue { .. } => {
                Some("Fix the manifest field noted in the error message.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::ParseError { .. } => "manifest.parse_error",
            Self::MissingField { .. } => "manifest.missing_field",
            Self::InvalidValue { .. } => "manifest.invalid_value",
        })
    }
}
