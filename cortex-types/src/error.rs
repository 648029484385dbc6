//! Error types for all cortex crates.
//!
//! Size overflow is never an error: bounded reducers convert it to
//! placeholder values. The enums here cover the failures that must reach
//! a caller: invalid budgets, sampler faults, and blob I/O.

use std::time::Duration;

/// Errors from truncation operations.
#[derive(Debug, thiserror::Error)]
pub enum TruncateError {
    /// The requested byte budget is zero.
    #[error("byte budget must be positive")]
    InvalidBudget,
}

/// Errors from a memory sampler implementation.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// The runtime refused or failed to report memory metrics.
    #[error("sampling failed: {0}")]
    Unavailable(String),
    /// Any other sampler error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the memory monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The monitor is not running.
    #[error("monitor is not running")]
    NotRunning,
    /// The underlying sampler failed.
    #[error("sampler error: {0}")]
    Sampler(#[from] SamplerError),
}

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// I/O error reading or writing a blob.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The operation exceeded its time budget.
    #[error("blob operation timed out after {0:?}")]
    Timeout(Duration),
    /// A referenced blob does not exist or is unreadable.
    #[error("blob missing: {0}")]
    Missing(String),
    /// Blob content failed verification against its hash.
    #[error("blob corrupt: {0}")]
    Corrupt(String),
}

/// Errors from checkpoint serialization.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Blob storage failed; the checkpoint was not emitted.
    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),
    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The byte stream does not start with the checkpoint magic.
    #[error("bad checkpoint header")]
    BadHeader,
    /// The checkpoint version is newer than this library understands.
    #[error("unsupported checkpoint version: {0}")]
    UnsupportedVersion(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_format_with_context() {
        let err = BlobError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30"));

        let err = CheckpointError::UnsupportedVersion(9);
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn io_errors_convert_into_blob_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: BlobError = io.into();
        assert!(matches!(err, BlobError::Io(_)));
    }
}
