//! Release/build store error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum StoreError {
    #[error("database error: {message}")]
    DatabaseError { message: String },

    #[error("failed to connect to {url}: {message}")]
    ConnectFailed { url: String, message: String },

    #[error("resource {id} not found")]
    ResourceNotFound { id: i64 },
}

impl UserFacingError for StoreError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ConnectFailed { .. } => Some("Check store.database_url."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseError { .. } | Self::ConnectFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::DatabaseError { .. } => "store.database",
            Self::ConnectFailed { .. } => "store.connect_failed",
            Self::ResourceNotFound { .. } => "store.resource_not_found",
        })
    }
}
