// PID file management for the daemon process

use crate::error::{DbCheckError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// The pid file whose presence means "a daemon is running"
///
/// Not locked: a start racing another start can both see no pid file.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create a pid file manager for the given path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write the current process id, replacing any stale content
    pub fn write_current(&self) -> Result<()> {
        self.write_pid(std::process::id())
    }

    /// Write `pid` followed by a newline
    pub fn write_pid(&self, pid: u32) -> Result<()> {
        fs::write(&self.path, format!("{}\n", pid))
            .map_err(|e| DbCheckError::PidFileError(format!("Failed to write PID file: {}", e)))
    }

    /// Read the recorded pid
    ///
    /// A missing file, content that is not UTF-8 or not a number, and a zero
    /// pid all read as `None`.
    pub fn read(&self) -> Result<Option<u32>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DbCheckError::PidFileError(format!(
                    "Failed to read PID file: {}",
                    e
                )))
            }
        };

        Ok(std::str::from_utf8(&content)
            .ok()
            .and_then(|text| text.trim().parse::<u32>().ok())
            .filter(|pid| *pid > 0))
    }

    /// Check if the PID file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove the PID file; a missing file is not an error
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DbCheckError::PidFileError(format!(
                "Failed to remove PID file: {}",
                e
            ))),
        }
    }

    /// Get the path to the PID file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tie removal of the file to the lifetime of the returned guard
    pub fn guard(&self) -> PidFileGuard {
        PidFileGuard {
            pid_file: self.clone(),
        }
    }
}

/// Removes the pid file when the daemon's entry point returns
#[derive(Debug)]
pub struct PidFileGuard {
    pid_file: PidFile,
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Err(e) = self.pid_file.remove() {
            tracing::warn!("Exit cleanup could not remove {}: {}", self.pid_file.path().display(), e);
        } else {
            tracing::debug!("Removed pid file {}", self.pid_file.path().display());
        }
    }
}
