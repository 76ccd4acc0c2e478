//! Storage path helpers.

use std::path::{Path, PathBuf};

const SIGNED_IN_USER_FILENAME: &str = "signedInUser.json";

/// Paths for account storage artifacts under `<root>/fxaccounts`.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
    accounts_dir: PathBuf,
}

impl StoragePaths {
    /// Builds storage paths rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let accounts_dir = root.join("fxaccounts");
        Self { root, accounts_dir }
    }

    /// Returns the storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the accounts storage directory.
    #[must_use]
    pub fn accounts_dir(&self) -> &Path {
        &self.accounts_dir
    }

    /// Returns the blob name of the signed-in user file.
    #[must_use]
    pub const fn signed_in_user_name() -> &'static str {
        SIGNED_IN_USER_FILENAME
    }

    /// Returns the full path of the signed-in user file.
    #[must_use]
    pub fn signed_in_user_path(&self) -> PathBuf {
        self.accounts_dir.join(SIGNED_IN_USER_FILENAME)
    }
}
