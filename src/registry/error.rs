//! Error types for the job registry client.
//!
//! [`RegistryError`] covers the three ways a status query goes wrong:
//! the record is absent, the registry answered with an error status, or
//! the network layer failed. Callers in the polling path map all of
//! them to "unknown job" rather than propagating.

use thiserror::Error;

/// Errors from the registry's job query API.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry has no record under the requested job name.
    #[error("job not found: {0}")]
    NotFound(String),

    /// The registry answered with a non-success status.
    #[error("registry error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Network-level failure (DNS, connection refused, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
