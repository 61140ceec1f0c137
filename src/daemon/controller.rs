// Daemon lifecycle control through the pid file and OS signals

use super::pid::PidFile;
use crate::config::DaemonConfig;
use crate::error::{DbCheckError, Result};
use crate::logs::LogHandle;
use std::time::Duration;

/// Delivers SIGTERM to a raw pid
#[cfg(unix)]
pub type Terminate = fn(i32) -> nix::Result<()>;

#[cfg(unix)]
fn send_sigterm(pid: i32) -> nix::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid), Signal::SIGTERM)
}

/// Starts a new daemon instance that records itself in `pid_file`
pub trait Launcher {
    fn launch(&self, pid_file: &PidFile) -> Result<()>;
}

/// What `stop` found and did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No usable pid file, nothing was signalled
    NotRunning,
    /// The recorded process is gone and its pid file was removed
    Stopped { pid: u32 },
}

/// Operator-facing start/stop/restart
///
/// Never holds a reference to a running server: `stop` works only through
/// the pid file and signal delivery, so it can run from a separate
/// invocation of the binary.
pub struct DaemonController<L: Launcher> {
    pid_file: PidFile,
    launcher: L,
    log: LogHandle,
    settle_interval: Duration,
    poll_interval: Duration,
    #[cfg(unix)]
    terminate: Terminate,
}

impl<L: Launcher> DaemonController<L> {
    pub fn new(config: &DaemonConfig, launcher: L, log: LogHandle) -> Self {
        Self {
            pid_file: PidFile::with_path(&config.pid_file),
            launcher,
            log,
            settle_interval: config.settle_interval(),
            poll_interval: config.stop_poll_interval(),
            #[cfg(unix)]
            terminate: send_sigterm,
        }
    }

    /// Replace how SIGTERM is delivered during `stop`
    #[cfg(unix)]
    pub fn with_terminate(mut self, terminate: Terminate) -> Self {
        self.terminate = terminate;
        self
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// Start the daemon unless the pid file names one already
    ///
    /// The recorded pid is not checked for liveness: a stale pid file left by
    /// a killed daemon blocks start until it is removed by hand.
    pub fn start(&self) -> Result<()> {
        let span = self.log.component("controller");
        let _enter = span.enter();

        tracing::debug!("start");
        if let Some(pid) = self.pid_file.read()? {
            let err = DbCheckError::DaemonAlreadyRunning {
                pid,
                path: self.pid_file.path().to_path_buf(),
            };
            tracing::error!("{}", err);
            return Err(err);
        }

        tracing::debug!("Pidfile not found, creating process");
        self.launcher.launch(&self.pid_file)
    }

    /// Signal the recorded daemon until it is gone, then remove its pid file
    #[cfg(unix)]
    pub fn stop(&self) -> Result<StopOutcome> {
        use nix::errno::Errno;

        let span = self.log.component("controller");
        let _enter = span.enter();

        tracing::debug!("stop");
        let Some(pid) = self.pid_file.read()? else {
            tracing::debug!(
                "pidfile {} does not exist. Daemon not running?",
                self.pid_file.path().display()
            );
            return Ok(StopOutcome::NotRunning);
        };
        tracing::debug!("Found pid {}", pid);

        // A pid above i32::MAX would turn into a process-group kill
        let raw = i32::try_from(pid)
            .map_err(|_| DbCheckError::SignalError(format!("pid {} is out of range", pid)))?;

        loop {
            tracing::debug!("Sending pid SIGTERM signal");
            match (self.terminate)(raw) {
                Ok(()) => std::thread::sleep(self.poll_interval),
                Err(Errno::ESRCH) => {
                    tracing::info!("Process {} killed, cleaning up pidfile", pid);
                    self.pid_file.remove()?;
                    return Ok(StopOutcome::Stopped { pid });
                }
                Err(e) => {
                    tracing::error!("Problem while killing process {}: {}", pid, e);
                    return Err(DbCheckError::SignalError(format!(
                        "Failed to send SIGTERM to {}: {}",
                        pid, e
                    )));
                }
            }
        }
    }

    #[cfg(not(unix))]
    pub fn stop(&self) -> Result<StopOutcome> {
        Err(DbCheckError::SignalError(
            "Daemon stop is only supported on Unix systems".to_string(),
        ))
    }

    /// Stop, let the old instance settle, start again
    ///
    /// There is no rollback: if start fails the daemon stays down.
    pub fn restart(&self) -> Result<()> {
        {
            let span = self.log.component("controller");
            let _enter = span.enter();
            tracing::debug!("restart");
        }

        self.stop()?;
        std::thread::sleep(self.settle_interval);
        self.start()
    }
}
