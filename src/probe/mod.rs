// Probe module - fresh connect, query, compare, disconnect per health check

mod mysql;

pub use mysql::{MySqlConnector, MySqlSession};

use crate::config::BackendConfig;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Answers "is the backend alive?"
///
/// Failures stay inside the implementation and come out as `false`, so a
/// broken probe and a backend that is not alive look the same to callers.
#[async_trait]
pub trait BackendProbe: Send + Sync {
    async fn probe(&self, backend: &BackendConfig) -> bool;
}

/// Failure at one stage of a probe. Only ever logged.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("row has no column {0}")]
    MissingColumn(usize),

    #[error("marker column could not be decoded: {0}")]
    Decode(String),

    #[error("close failed: {0}")]
    Close(String),

    #[error("session already closed")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Opens sessions against the backend; the driver seam
#[async_trait]
pub trait BackendConnector: Send + Sync {
    type Session: BackendSession;

    async fn connect(&self, backend: &BackendConfig) -> Result<Self::Session, ProbeError>;
}

/// One open backend connection
#[async_trait]
pub trait BackendSession: Send {
    /// Run `query` and return `column` of the first row, `None` when no rows
    async fn fetch_marker(&mut self, query: &str, column: usize)
        -> Result<Option<String>, ProbeError>;

    async fn close(&mut self) -> Result<(), ProbeError>;
}

/// Probe that releases its session on every path once connected
pub struct ScopedProbe<C> {
    connector: C,
    limit: Option<Duration>,
}

impl<C: BackendConnector> ScopedProbe<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            limit: None,
        }
    }

    /// Bound the whole probe, close included, by one deadline
    ///
    /// When the deadline passes during connect or query the probe answers
    /// `false`. A close still in flight at the deadline is abandoned and the
    /// session is dropped, which tears down its socket.
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.limit = limit;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    async fn bounded<T, F>(&self, deadline: Option<Instant>, stage: F) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, ProbeError>>,
    {
        match (deadline, self.limit) {
            (Some(deadline), Some(limit)) => tokio::time::timeout_at(deadline, stage)
                .await
                .map_err(|_| ProbeError::Timeout(limit))?,
            _ => stage.await,
        }
    }

    async fn check_marker(
        &self,
        session: &mut C::Session,
        backend: &BackendConfig,
        deadline: Option<Instant>,
    ) -> Result<bool, ProbeError> {
        tracing::debug!("Attempting DB Query, {}", backend.query);
        let marker = self
            .bounded(
                deadline,
                session.fetch_marker(&backend.query, backend.marker_column),
            )
            .await?;

        tracing::debug!("Collecting result from query");
        Ok(marker.as_deref() == Some(backend.expected_marker.as_str()))
    }
}

#[async_trait]
impl<C: BackendConnector> BackendProbe for ScopedProbe<C> {
    async fn probe(&self, backend: &BackendConfig) -> bool {
        let deadline = self.limit.map(|limit| Instant::now() + limit);

        tracing::debug!("Attempting to connect to DB");
        let mut session = match self.bounded(deadline, self.connector.connect(backend)).await {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!("Database health check failed: {}", e);
                return false;
            }
        };

        let outcome = self.check_marker(&mut session, backend, deadline).await;

        tracing::debug!("Closing connection to DB");
        if let Err(e) = self.bounded(deadline, session.close()).await {
            tracing::debug!("Closing connection to DB failed: {}", e);
        }
        drop(session);

        match outcome {
            Ok(alive) => alive,
            Err(e) => {
                tracing::debug!("Database health check failed: {}", e);
                false
            }
        }
    }
}
