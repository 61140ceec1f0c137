// MySQL driver for the backend probe

use super::{BackendConnector, BackendSession, ProbeError};
use crate::config::BackendConfig;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Row};

/// Connects to MySQL with the credentials from [`BackendConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

/// A single unpooled MySQL connection
pub struct MySqlSession {
    conn: Option<MySqlConnection>,
}

#[async_trait]
impl BackendConnector for MySqlConnector {
    type Session = MySqlSession;

    async fn connect(&self, backend: &BackendConfig) -> Result<MySqlSession, ProbeError> {
        let options = MySqlConnectOptions::new()
            .host(&backend.host)
            .port(backend.port)
            .username(&backend.user)
            .password(&backend.password)
            .database(&backend.database);

        let conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        Ok(MySqlSession { conn: Some(conn) })
    }
}

#[async_trait]
impl BackendSession for MySqlSession {
    async fn fetch_marker(
        &mut self,
        query: &str,
        column: usize,
    ) -> Result<Option<String>, ProbeError> {
        let conn = self.conn.as_mut().ok_or(ProbeError::Closed)?;

        let row = sqlx::query(query)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| ProbeError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        if column >= row.len() {
            return Err(ProbeError::MissingColumn(column));
        }

        row.try_get::<String, _>(column)
            .map(Some)
            .map_err(|e| ProbeError::Decode(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ProbeError> {
        match self.conn.take() {
            Some(conn) => conn.close().await.map_err(|e| ProbeError::Close(e.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{BackendProbe, ScopedProbe};
    use std::net::TcpListener;

    #[tokio::test]
    async fn test_unreachable_server_reports_down() {
        // Grab a free port and release it so nothing is listening there
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = BackendConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..BackendConfig::default()
        };

        let probe = ScopedProbe::new(MySqlConnector);
        assert!(!probe.probe(&backend).await);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_queries() {
        let mut session = MySqlSession { conn: None };

        assert!(matches!(
            session.fetch_marker("SELECT 1", 0).await,
            Err(ProbeError::Closed)
        ));
        assert!(session.close().await.is_ok());
    }
}
