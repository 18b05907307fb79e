//! Watch directory lock
//!
//! One `drivesync watch` per directory: the watcher holds an exclusive
//! advisory lock on `<dir>/.drivesync-lock` for as long as it runs. The file
//! carries the holder's PID and is removed when the lock is released.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the lock file inside a watched directory
pub const LOCK_FILE_NAME: &str = ".drivesync-lock";

#[derive(Debug, Error)]
pub enum LockError {
    /// Another process holds the lock
    #[error("{path} is locked by another drivesync process")]
    Held { path: PathBuf },

    #[error("failed to lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive lock on a watched directory, released on drop
#[derive(Debug)]
pub struct DirectoryLock {
    path: PathBuf,
    file: File,
}

impl DirectoryLock {
    /// Takes the lock on `dir` without waiting
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE_NAME);
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(io_err)?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() == fs2::lock_contended_error().kind() {
                return Err(LockError::Held { path: path.clone() });
            }
            return Err(io_err(err));
        }

        file.set_len(0).map_err(io_err)?;
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;
        debug!(path = %path.display(), "Acquired directory lock");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "Failed to remove lock file");
        }
        if let Err(err) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %err, "Failed to release lock");
        }
    }
}
