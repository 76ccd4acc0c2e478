//! Filesystem-backed blob store.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::error::{map_io_err, StorageResult};
use super::paths::StoragePaths;
use super::traits::AtomicBlobStore;

/// Blob store keeping one file per blob inside a directory.
///
/// Writes go to a uniquely named temporary file which is synced and then renamed
/// over the target, so readers see either the old or the new content.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Creates a blob store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Creates a blob store in the accounts directory of `paths`.
    #[must_use]
    pub fn from_paths(paths: &StoragePaths) -> Self {
        Self::new(paths.accounts_dir())
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl AtomicBlobStore for FileBlobStore {
    fn read(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io_err(&err)),
        }
    }

    fn write_atomic(&self, path: &str, bytes: &[u8]) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).map_err(|err| map_io_err(&err))?;
        let target = self.blob_path(path);
        let tmp = self
            .dir
            .join(format!(".{path}.{}.tmp", uuid::Uuid::new_v4().simple()));

        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        })();
        if let Err(err) = result {
            // Best effort: the write error is reported either way.
            let _ = fs::remove_file(&tmp);
            return Err(map_io_err(&err));
        }
        Ok(())
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        match fs::remove_file(self.blob_path(path)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(map_io_err(&err)),
        }
    }
}
