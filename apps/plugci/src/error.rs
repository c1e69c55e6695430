//! CLI error handling

use std::fmt;

use plugci_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(plugci_errors::ConfigError),
    /// Build pipeline error
    Build(plugci_errors::Error),
    /// CI manifest could not be read or does not declare the project
    Manifest(plugci_errors::ManifestError),
    /// Invalid command arguments
    InvalidArguments(String),
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::Build(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::Manifest(e) => {
                write!(f, "CI manifest error: {}", e.user_message())?;
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                Ok(())
            }
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Build(e) => Some(e),
            CliError::Manifest(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::InvalidArguments(_) => None,
        }
    }
}

impl From<plugci_errors::ConfigError> for CliError {
    fn from(e: plugci_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<plugci_errors::Error> for CliError {
    fn from(e: plugci_errors::Error) -> Self {
        match e {
            plugci_errors::Error::Config(e) => CliError::Config(e),
            other => CliError::Build(other),
        }
    }
}

impl From<plugci_errors::ManifestError> for CliError {
    fn from(e: plugci_errors::ManifestError) -> Self {
        CliError::Manifest(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
