// Server module - TCP health-check protocol

pub mod handler;
pub mod listener;

pub use handler::{handle_connection, Reply, MAX_REQUEST_BYTES};
pub use listener::{BoundServer, HealthCheckServer};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::logs::LogHandle;
use crate::probe::{MySqlConnector, ScopedProbe};
use std::sync::Arc;
use tracing::Instrument;

/// Daemon entry point: build the runtime and serve until terminated
///
/// Runs inside the daemonized grandchild. The runtime's worker threads are
/// created here, after both forks, because threads do not survive `fork`.
pub fn run_daemon(config: &ServerConfig, log: &LogHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let probe = ScopedProbe::new(MySqlConnector).with_timeout(config.probe_timeout());
    let server = HealthCheckServer::new(Arc::new(config.clone()), Arc::new(probe));

    tracing::debug!("Starting TCP Server");
    runtime.block_on(server.serve().instrument(log.component("server")))
}
