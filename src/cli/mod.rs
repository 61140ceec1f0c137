// CLI module - operator surface for the daemon lifecycle

pub mod output;

use crate::config::AppConfig;
use crate::daemon::{DaemonController, ForkLauncher};
use crate::error::Result;
use crate::logs;
use crate::server;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// dbcheck - TCP health check for a backing database
#[derive(Debug, Parser)]
#[command(name = "dbcheck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Lifecycle action
    #[arg(value_enum)]
    pub action: Action,

    /// Configuration file (.toml or .json); built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Daemonize and serve health checks
    Start,
    /// Terminate the running daemon
    Stop,
    /// Stop, wait for the settle interval, start
    Restart,
}

impl Cli {
    /// Parse arguments (usage errors exit with status 2) and execute
    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.execute()
    }

    /// Execute the parsed command
    pub fn execute(&self) -> Result<()> {
        let config = AppConfig::load(self.config.as_deref())?;
        let log = logs::init(&config.log)?;

        let result = self.dispatch(config, log);
        if let Err(e) = &result {
            tracing::error!("Error: {}", e);
        }
        result
    }

    fn dispatch(&self, config: AppConfig, log: logs::LogHandle) -> Result<()> {
        let server_config = config.server.clone();
        let entry_log = log.clone();
        let launcher = ForkLauncher::new(&config.daemon.workdir, log.clone(), move || {
            server::run_daemon(&server_config, &entry_log)
        });
        let controller = DaemonController::new(&config.daemon, launcher, log);

        match self.action {
            Action::Start => {
                output::print_starting(controller.pid_file().path());
                controller.start()
            }
            Action::Stop => controller.stop().map(output::print_stopped),
            Action::Restart => {
                output::print_starting(controller.pid_file().path());
                controller.restart()
            }
        }
    }
}
