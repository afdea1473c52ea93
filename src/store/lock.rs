//! store::lock
//!
//! Advisory lock on a result cache.
//!
//! Several plug processes may share one cache. Key writes, pool bookkeeping
//! and multi-step reads such as `tools cache-status` hold `<cache>/.lock`
//! for their whole duration. The OS lock is dropped with the guard.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Name of the lock file inside a cache.
pub const LOCK_FILE: &str = ".lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("cannot open the cache lock {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot lock the cache at {path}: {source}")]
    Acquire {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Guard for an exclusively locked cache.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
    file: File,
}

impl CacheLock {
    /// Block until the cache rooted at `cache_root` is ours.
    pub fn acquire(cache_root: &Path) -> Result<Self, LockError> {
        let path = cache_root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| LockError::Acquire {
            path: cache_root.to_path_buf(),
            source,
        })?;
        Ok(Self { path, file })
    }

    /// Whether another process currently holds the cache.
    pub fn is_contended(cache_root: &Path) -> bool {
        let Ok(file) = File::open(cache_root.join(LOCK_FILE)) else {
            return false;
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_file_lives_in_cache_root() {
        let temp = TempDir::new().unwrap();
        let lock = CacheLock::acquire(temp.path()).unwrap();
        assert_eq!(lock.path(), temp.path().join(LOCK_FILE));
        assert!(lock.path().exists());
    }

    #[test]
    fn held_lock_is_contended_until_dropped() {
        let temp = TempDir::new().unwrap();
        let held = CacheLock::acquire(temp.path()).unwrap();
        assert!(CacheLock::is_contended(temp.path()));
        drop(held);
        assert!(!CacheLock::is_contended(temp.path()));
    }

    #[test]
    fn missing_cache_root_fails_to_open() {
        let temp = TempDir::new().unwrap();
        let err = CacheLock::acquire(&temp.path().join("absent")).unwrap_err();
        assert!(matches!(err, LockError::Open { .. }));
    }
}
