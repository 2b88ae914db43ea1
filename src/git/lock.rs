//! Filesystem locking of working copies
//!
//! Two runs ingesting the same repository share one working copy directory.
//! An exclusive flock() held for the whole run keeps the second run from
//! cloning or fetching into a directory the first one is still using.

use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

const LOCK_DIR: &str = ".waterfall-locks";

/// Short, filesystem-safe digest of a repository identity
pub(crate) fn identity_digest(repository_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash[..16].to_string()
}

/// Get the lock file path for a repository under a working copy root
fn lock_file_path(workdir: &Path, repository_id: &str) -> PathBuf {
    workdir
        .join(LOCK_DIR)
        .join(format!("{}.lock", identity_digest(repository_id)))
}

/// Guard that holds an exclusive lock on one working copy
///
/// The lock is released when this guard is dropped, or by the OS if the
/// process dies.
#[derive(Debug)]
pub struct WorkingCopyLock {
    _file: File,
    path: PathBuf,
}

impl WorkingCopyLock {
    /// Try to acquire the lock without blocking
    ///
    /// Returns:
    /// - `Ok(Some(guard))` if the lock was acquired
    /// - `Ok(None)` if another process holds the lock
    /// - `Err(...)` on IO errors
    pub fn try_acquire(workdir: &Path, repository_id: &str) -> io::Result<Option<Self>> {
        let lock_path = lock_file_path(workdir, repository_id);

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(
                    "Acquired working copy lock for {} (lock_file={:?})",
                    repository_id,
                    lock_path
                );
                Ok(Some(Self {
                    _file: file,
                    path: lock_path,
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                tracing::debug!(
                    "Working copy lock for {} is held elsewhere (lock_file={:?})",
                    repository_id,
                    lock_path
                );
                Ok(None)
            }
            // fs2 reports contention on some platforms with the raw lock error
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingCopyLock {
    fn drop(&mut self) {
        // Closing the file releases the lock; the file itself is reused
        tracing::debug!("Releasing working copy lock {:?}", self.path);
    }
}
