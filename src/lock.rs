//! File-based locking for commit serialization.
//!
//! Uses flock-style advisory locking so that two processes mutating
//! the same local services directory cannot interleave their commits.
//! The in-process `firewall-cmd` lock serializes individual command
//! invocations; this guard serializes whole commits.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use fs2::FileExt;
use tracing::debug;

use crate::error::FwsetError;

/// Name of the lock file kept inside the local services directory.
const LOCK_FILE_NAME: &str = ".fwset.lock";

/// A guard holding an exclusive lock for the duration of a commit.
/// The lock is released when the guard is dropped.
pub struct CommitGuard {
    _file: File,
}

impl CommitGuard {
    /// Acquires the commit lock for a local services directory,
    /// blocking until any concurrent commit finishes.
    ///
    /// The file is opened read-write without truncation so creation
    /// and locking cannot race.
    pub fn acquire(local_dir: &Path) -> Result<Self, FwsetError> {
        fs::create_dir_all(local_dir)?;
        let lock_path = local_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        fs::set_permissions(&lock_path, fs::Permissions::from_mode(0o600))?;
        debug!(path = %lock_path.display(), "acquiring commit lock");
        file.lock_exclusive()?;
        Ok(CommitGuard { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_lock_file() {
        let dir = TempDir::new().unwrap();
        let guard = CommitGuard::acquire(dir.path()).unwrap();
        assert!(dir.path().join(LOCK_FILE_NAME).exists());
        drop(guard);
    }

    #[test]
    fn test_reacquire_after_drop() {
        let dir = TempDir::new().unwrap();
        drop(CommitGuard::acquire(dir.path()).unwrap());
        // A released lock must be acquirable again.
        drop(CommitGuard::acquire(dir.path()).unwrap());
    }

    #[test]
    fn test_acquire_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("services");
        let _guard = CommitGuard::acquire(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_lock_file_permissions() {
        let dir = TempDir::new().unwrap();
        let _guard = CommitGuard::acquire(dir.path()).unwrap();
        let mode = fs::metadata(dir.path().join(LOCK_FILE_NAME))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
