use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::StoreError;

/// Advisory lock guarding a catalog file against a second coordinator
/// process (`flock(2)` on Unix).
///
/// Released when dropped, which closes the underlying descriptor.
#[derive(Debug)]
pub struct CatalogLock {
    _file: File,
}

impl CatalogLock {
    fn open(path: &Path) -> Result<File, StoreError> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }

    /// Take the lock without blocking.
    /// Returns `Err(StoreError::FileLocked)` if another handle holds it.
    pub fn try_exclusive(path: &Path) -> Result<Self, StoreError> {
        let file = Self::open(path)?;
        file.try_lock_exclusive()
            .map_err(|_| StoreError::FileLocked)?;
        Ok(Self { _file: file })
    }
}
