//! Provider seam
//!
//! Environment-specific backends implement [`LogProvider`] against the
//! service-logs contract. Providers receive an already-validated
//! [`LogQuery`] and a borrowed sink; they emit entries, honor the tail
//! window and start-time filter, and return once history is exhausted
//! (or, when following, once cancellation is observed).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::LogQuery;
use crate::stream::LogSink;

/// Errors a provider can surface while streaming logs.
///
/// Entries already streamed before a failure remain valid; a failure
/// terminates the invocation but retracts nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The requested service is not known to the provider.
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// The log source could not be reached.
    #[error("log source unreachable: {0}")]
    Unreachable(String),

    /// The provider is not allowed to read the log source.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other provider failure.
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Creates an [`ProviderError::Other`] from a message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// A provider implementation of the service-logs action.
///
/// Obligations (checked by the contract's tests, not enforceable here):
/// - entries are emitted in non-decreasing timestamp order where
///   timestamps exist
/// - cancellation is observed within one polling/I/O cycle
/// - any acquired handle (file, subprocess, connection) is released on
///   every exit path
#[async_trait]
pub trait LogProvider: Send + Sync {
    /// Streams log entries for the queried service into `sink`.
    ///
    /// Returning `Ok(())` signals that the provider is done producing,
    /// either because history is exhausted (`follow = false`) or because
    /// cancellation was observed (`follow = true`). The invocation
    /// driver, not the provider, records the terminal stream signal.
    async fn service_logs(&self, query: &LogQuery, sink: &LogSink) -> Result<(), ProviderError>;
}
