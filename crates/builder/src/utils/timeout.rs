//! Timeout utilities for sandbox operations

use plugci_errors::{Error, SandboxError};
use std::future::Future;
use std::time::Duration;

/// Execute a future with a timeout, mapping expiry to `SandboxError::Timeout`
///
/// # Errors
///
/// Returns the future's own error, or a timeout error naming `id`.
pub async fn with_timeout<T, F>(future: F, timeout: Duration, id: &str) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| -> Error {
            SandboxError::Timeout {
                id: id.to_string(),
                seconds: timeout.as_secs(),
            }
            .into()
        })?
}
