//! Credential store persisting the signed-in user as a versioned JSON document.

use std::sync::Arc;

use super::envelope::SignedInUserEnvelope;
use super::error::StorageResult;
use super::file::FileBlobStore;
use super::memory::InMemoryBlobStore;
use super::paths::StoragePaths;
use super::traits::{AtomicBlobStore, CredentialStore};
use super::types::CredentialRecord;

/// [`CredentialStore`] writing `{"version": 1, "accountData": {...}}` documents
/// through an [`AtomicBlobStore`].
pub struct JsonCredentialStore {
    blob_store: Arc<dyn AtomicBlobStore>,
    name: String,
}

impl std::fmt::Debug for JsonCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCredentialStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl JsonCredentialStore {
    /// Creates a store writing the blob `name` of `blob_store`.
    #[must_use]
    pub fn new(blob_store: Arc<dyn AtomicBlobStore>, name: impl Into<String>) -> Self {
        Self {
            blob_store,
            name: name.into(),
        }
    }

    /// Creates a store backed by `signedInUser.json` under `paths`.
    #[must_use]
    pub fn from_paths(paths: &StoragePaths) -> Self {
        Self::new(
            Arc::new(FileBlobStore::from_paths(paths)),
            StoragePaths::signed_in_user_name(),
        )
    }

    /// Creates a store that only lives as long as the process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryBlobStore::new()),
            StoragePaths::signed_in_user_name(),
        )
    }
}

impl CredentialStore for JsonCredentialStore {
    fn get(&self) -> StorageResult<Option<CredentialRecord>> {
        let Some(bytes) = self.blob_store.read(&self.name)? else {
            return Ok(None);
        };
        let envelope = SignedInUserEnvelope::deserialize(&bytes)?;
        Ok(Some(envelope.account_data))
    }

    fn put(&self, record: &CredentialRecord) -> StorageResult<()> {
        let bytes = SignedInUserEnvelope::new(record.clone()).serialize()?;
        self.blob_store.write_atomic(&self.name, &bytes)
    }

    fn clear(&self) -> StorageResult<()> {
        self.blob_store.delete(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_get_put_clear() {
        let store = JsonCredentialStore::in_memory();
        assert_eq!(store.get().expect("get"), None);

        let record = CredentialRecord {
            email: Some("foo@example.com".to_string()),
            uid: Some("1234@lcip.org".to_string()),
            k_b: Some("cafe".to_string()),
            is_verified: true,
            ..CredentialRecord::default()
        };
        store.put(&record).expect("put");
        assert_eq!(store.get().expect("get"), Some(record));

        store.clear().expect("clear");
        assert_eq!(store.get().expect("get"), None);
        store.clear().expect("clear is idempotent");
    }

    #[test]
    fn test_rejects_unknown_version() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        blobs
            .write_atomic("user.json", br#"{"version":7,"accountData":{}}"#)
            .expect("write");
        let store = JsonCredentialStore::new(blobs, "user.json");
        match store.get() {
            Err(StorageError::UnsupportedVersion(7)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
