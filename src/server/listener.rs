// Health-check server - accepts connections and dispatches one task each

use super::handler::handle_connection;
use crate::config::ServerConfig;
use crate::error::{DbCheckError, Result};
use crate::probe::BackendProbe;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Pause after a failed accept so a persistent error does not spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP health-check server
///
/// Holds no per-connection state. Handlers share only the read-only config
/// and the probe, so nothing here needs a lock. There is no admission limit:
/// every accepted connection gets its own task, and since reads and probes
/// have no timeout unless configured, a stuck peer pins its task forever.
pub struct HealthCheckServer {
    config: Arc<ServerConfig>,
    probe: Arc<dyn BackendProbe>,
}

/// A server whose listener is bound and ready to accept
pub struct BoundServer {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    probe: Arc<dyn BackendProbe>,
}

impl HealthCheckServer {
    pub fn new(config: Arc<ServerConfig>, probe: Arc<dyn BackendProbe>) -> Self {
        Self { config, probe }
    }

    /// Bind the listening socket at the configured address
    pub async fn bind(self) -> Result<BoundServer> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| DbCheckError::BindError { addr, source })?;

        Ok(BoundServer {
            listener,
            config: self.config,
            probe: self.probe,
        })
    }

    /// Bind and serve; only returns if binding fails
    pub async fn serve(self) -> Result<()> {
        self.bind().await?.serve().await
    }
}

impl BoundServer {
    /// Address actually bound, useful when the configured port is 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the process is terminated
    pub async fn serve(self) -> Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!("Health check server listening on {}", addr);
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let config = Arc::clone(&self.config);
            let probe = Arc::clone(&self.probe);

            tokio::spawn(async move {
                handle_connection(stream, peer, &config, probe.as_ref()).await;
            });
        }
    }
}
