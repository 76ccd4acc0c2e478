//! Platform interfaces for signed-in user storage.

use super::error::StorageResult;
use super::types::CredentialRecord;

/// Durable storage for the credential record of the signed-in user.
///
/// Implementations must provide read-your-writes consistency within a process.
pub trait CredentialStore: Send + Sync {
    /// Reads the stored record, if a user is signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored data is unreadable.
    fn get(&self) -> StorageResult<Option<CredentialRecord>>;

    /// Replaces the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put(&self, record: &CredentialRecord) -> StorageResult<()>;

    /// Erases the stored record. Succeeds when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn clear(&self) -> StorageResult<()>;
}

/// Atomic blob store for small binary files (e.g., `signedInUser.json`).
pub trait AtomicBlobStore: Send + Sync {
    /// Reads the blob at `path`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn read(&self, path: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes bytes atomically to `path`.
    ///
    /// The blob is either the complete old content or the complete new content,
    /// never a partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_atomic(&self, path: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Deletes the blob at `path`. Succeeds when the blob does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, path: &str) -> StorageResult<()>;
}
