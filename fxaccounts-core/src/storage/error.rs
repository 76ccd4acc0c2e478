//! Error types for signed-in user storage.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by credential storage primitives.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
pub enum StorageError {
    /// Errors coming from the blob store.
    #[error("blob store error: {0}")]
    BlobStore(String),

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unsupported signed-in user envelope version.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u32),
}

pub(crate) fn map_io_err(err: &std::io::Error) -> StorageError {
    StorageError::BlobStore(err.to_string())
}
