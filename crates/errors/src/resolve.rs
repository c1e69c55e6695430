//! Dependency resolution error types
//!
//! These never fail a build; the resolver turns them into skip reasons.

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ResolveError {
    #[error("virion {name} not found in {owner}/{repo}")]
    VirionNotFound {
        owner: String,
        repo: String,
        name: String,
    },

    #[error("no build of {name} satisfies {constraint}")]
    NoMatchingVersion { name: String, constraint: String },

    #[error("invalid version constraint `{constraint}`: {message}")]
    InvalidConstraint { constraint: String, message: String },

    #[error("lookup failed: {message}")]
    LookupFailed { message: String },
}

impl UserFacingError for ResolveError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::LookupFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::VirionNotFound { .. } => "resolve.virion_not_found",
            Self::NoMatchingVersion { .. } => "resolve.no_matching_version",
            Self::InvalidConstraint { .. } => "resolve.invalid_constraint",
            Self::LookupFailed { .. } => "resolve.lookup_failed",
        })
    }
}
