// Daemonization support for Unix systems

use super::controller::Launcher;
use super::pid::PidFile;
use crate::error::{DbCheckError, Result};
use crate::logs::LogHandle;
use std::path::{Path, PathBuf};

/// Detach from the launching session and run `entry` as the daemon
///
/// The classic double fork: both intermediate parents exit with status 0, so
/// this only returns in the surviving grandchild, with the result of `entry`.
/// The steps run in a fixed order; moving `setsid` after the second fork or
/// writing the pid before it would record the wrong process.
///
/// Must be called before any threads are started (in particular before a
/// tokio runtime is built), since only the calling thread survives `fork`.
#[cfg(unix)]
pub fn daemonize<F, T>(workdir: &Path, pid_file: &PidFile, log: &LogHandle, entry: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    use nix::sys::stat::{umask, Mode};
    use nix::unistd::{fork, setsid, ForkResult};
    use std::io::Write;

    let span = log.component("daemonizer");
    let _enter = span.enter();

    tracing::debug!("daemonize");
    if !workdir.is_dir() {
        return Err(DbCheckError::InvalidWorkdir(workdir.to_path_buf()));
    }

    // Exit first parent so the launching shell gets its prompt back
    tracing::debug!("Attempting to fork and then exit first process");
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => {
            return Err(DbCheckError::ForkFailed {
                stage: 1,
                source: e.into(),
            })
        }
    }

    tracing::debug!("Attempting to decouple from parent environment");
    std::env::set_current_dir(workdir).map_err(|source| DbCheckError::ChdirFailed {
        path: workdir.to_path_buf(),
        source,
    })?;
    setsid().map_err(|e| DbCheckError::SessionFailed(e.to_string()))?;
    umask(Mode::empty());

    // Second fork: the grandchild is not a session leader and can never
    // reacquire a controlling terminal
    tracing::debug!("Attempting to fork and exit second parent");
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => {
            return Err(DbCheckError::ForkFailed {
                stage: 2,
                source: e.into(),
            })
        }
    }

    tracing::debug!("Redirecting standard file descriptors");
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    redirect_std_streams()?;

    let _cleanup = pid_file.guard();
    pid_file.write_current()?;

    tracing::info!(
        pid = std::process::id(),
        pid_file = %pid_file.path().display(),
        "Daemonizing successful, entering run"
    );
    entry()
}

#[cfg(not(unix))]
pub fn daemonize<F, T>(
    _workdir: &Path,
    _pid_file: &PidFile,
    _log: &LogHandle,
    _entry: F,
) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    Err(DbCheckError::SessionFailed(
        "Daemonization is only supported on Unix systems".to_string(),
    ))
}

/// Point stdin, stdout and stderr at /dev/null
#[cfg(unix)]
fn redirect_std_streams() -> Result<()> {
    use nix::libc;
    use nix::unistd::dup2;
    use std::fs::OpenOptions;
    use std::os::unix::io::AsRawFd;

    let devnull = OpenOptions::new()
        .read(true)
        .append(true)
        .open("/dev/null")
        .map_err(|e| DbCheckError::RedirectFailed(format!("Failed to open /dev/null: {}", e)))?;

    let devnull_fd = devnull.as_raw_fd();
    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        dup2(devnull_fd, target)
            .map_err(|e| DbCheckError::RedirectFailed(format!("dup2 onto fd {}: {}", target, e)))?;
    }

    Ok(())
}

/// Production launcher: double-forks and runs the entry point in the daemon
pub struct ForkLauncher {
    workdir: PathBuf,
    log: LogHandle,
    entry: Box<dyn Fn() -> Result<()>>,
}

impl ForkLauncher {
    pub fn new<F>(workdir: impl Into<PathBuf>, log: LogHandle, entry: F) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        Self {
            workdir: workdir.into(),
            log,
            entry: Box::new(entry),
        }
    }
}

impl Launcher for ForkLauncher {
    fn launch(&self, pid_file: &PidFile) -> Result<()> {
        daemonize(&self.workdir, pid_file, &self.log, || (self.entry)())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn test_log(dir: &TempDir) -> LogHandle {
        let config = LogConfig {
            file: dir.path().join("dbcheck.log"),
            level: "debug".to_string(),
        };
        crate::logs::build_subscriber(&config).unwrap().1
    }

    // Only the pre-fork validation can run inside the test process
    #[test]
    fn test_missing_workdir_fails_before_forking() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::with_path(temp_dir.path().join("dbcheck.pid"));
        let missing = temp_dir.path().join("does-not-exist");
        let ran = Cell::new(false);

        let result = daemonize(&missing, &pid_file, &test_log(&temp_dir), || {
            ran.set(true);
            Ok(())
        });

        assert!(matches!(result, Err(DbCheckError::InvalidWorkdir(path)) if path == missing));
        assert!(!ran.get());
        assert!(!pid_file.exists());
    }

    #[test]
    fn test_fork_launcher_rejects_file_as_workdir() {
        let temp_dir = TempDir::new().unwrap();
        let not_a_dir = temp_dir.path().join("plain-file");
        std::fs::write(&not_a_dir, "x").unwrap();
        let pid_file = PidFile::with_path(temp_dir.path().join("dbcheck.pid"));

        let launcher = ForkLauncher::new(&not_a_dir, test_log(&temp_dir), || Ok(()));

        assert!(matches!(
            launcher.launch(&pid_file),
            Err(DbCheckError::InvalidWorkdir(_))
        ));
    }
}
