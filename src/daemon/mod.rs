// Daemon module - detachment, pid file and lifecycle control

pub mod controller;
pub mod daemonize;
pub mod pid;

pub use controller::{DaemonController, Launcher, StopOutcome};
pub use daemonize::{daemonize, ForkLauncher};
pub use pid::{PidFile, PidFileGuard};
