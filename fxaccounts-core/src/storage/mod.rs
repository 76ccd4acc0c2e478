//! Signed-in user storage: the credential record, its versioned envelope and the
//! pluggable blob backends beneath it.

mod credential_store;
mod envelope;
pub mod error;
mod file;
mod memory;
pub mod paths;
pub mod traits;
pub mod types;

pub use credential_store::JsonCredentialStore;
pub use error::{StorageError, StorageResult};
pub use file::FileBlobStore;
pub use memory::InMemoryBlobStore;
pub use paths::StoragePaths;
pub use traits::{AtomicBlobStore, CredentialStore};
pub use types::CredentialRecord;
