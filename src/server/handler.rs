// Per-connection health-check handling

use crate::config::ServerConfig;
use crate::probe::BackendProbe;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the one and only read taken from a connection
pub const MAX_REQUEST_BYTES: usize = 1024;

/// The two possible answers on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Up,
    Down,
}

impl Reply {
    /// Wire token for this reply
    pub fn token<'a>(&self, config: &'a ServerConfig) -> &'a str {
        match self {
            Reply::Up => &config.up_token,
            Reply::Down => &config.down_token,
        }
    }
}

/// Answer one health-check connection and close it
///
/// The request is a single best-effort read of at most [`MAX_REQUEST_BYTES`]
/// with no framing. A payload that is not byte-for-byte the health-check
/// token is answered with the down token and never reaches the backend, so
/// unauthenticated clients cannot generate database load.
///
/// Never fails: read, probe and write errors all end in the down reply (when
/// it can still be written) and the stream is shut down on every path.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    config: &ServerConfig,
    probe: &dyn BackendProbe,
) -> Reply
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::debug!("Handler started for client {}", peer);

    let reply = match read_request(&mut stream, config).await {
        Ok(payload) if payload == config.health_check_token.as_bytes() => {
            tracing::debug!("Received valid health check request from {}", peer);
            if probe.probe(&config.backend).await {
                tracing::debug!("Database Health Check: DB Up");
                Reply::Up
            } else {
                tracing::debug!("Database Health Check: DB Down");
                Reply::Down
            }
        }
        Ok(payload) => {
            tracing::warn!(
                "Received invalid health check request from {}: {:?}",
                peer,
                String::from_utf8_lossy(&payload)
            );
            Reply::Down
        }
        Err(e) => {
            tracing::warn!("Failed to read request from {}: {}", peer, e);
            Reply::Down
        }
    };

    if let Err(e) = stream.write_all(reply.token(config).as_bytes()).await {
        tracing::debug!("Failed to write response to {}: {}", peer, e);
    }
    if let Err(e) = stream.shutdown().await {
        tracing::debug!("Failed to shut down connection to {}: {}", peer, e);
    }

    tracing::debug!("finish {}", peer);
    reply
}

async fn read_request<S>(stream: &mut S, config: &ServerConfig) -> std::io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; MAX_REQUEST_BYTES];
    let read = stream.read(&mut buf);

    let n = match config.read_timeout() {
        Some(limit) => tokio::time::timeout(limit, read).await.map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "request read timed out")
        })??,
        None => read.await?,
    };

    Ok(buf[..n].to_vec())
}
