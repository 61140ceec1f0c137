// Integration tests for the TCP health-check server

use async_trait::async_trait;
use dbcheck::client;
use dbcheck::config::{BackendConfig, ServerConfig};
use dbcheck::probe::BackendProbe;
use dbcheck::server::HealthCheckServer;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Probe whose answer can be flipped while the server runs
struct SwitchProbe {
    alive: AtomicBool,
    calls: AtomicUsize,
}

impl SwitchProbe {
    fn new(alive: bool) -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(alive),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl BackendProbe for SwitchProbe {
    async fn probe(&self, _backend: &BackendConfig) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.alive.load(Ordering::SeqCst)
    }
}

/// Start a server on an ephemeral loopback port
async fn start_server(probe: Arc<SwitchProbe>) -> SocketAddr {
    let config = ServerConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    };

    let bound = HealthCheckServer::new(Arc::new(config), probe)
        .bind()
        .await
        .expect("Failed to bind server");
    let addr = bound.local_addr().unwrap();

    tokio::spawn(bound.serve());
    addr
}

async fn check(addr: SocketAddr, token: &'static str) -> String {
    tokio::task::spawn_blocking(move || {
        client::check(addr, token, Some(Duration::from_secs(5))).expect("health check failed")
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_end_to_end_up_then_closed() {
    let probe = SwitchProbe::new(true);
    let addr = start_server(Arc::clone(&probe)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"8675309").await.unwrap();

    // read_to_end only finishes once the server closes the connection
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();

    assert_eq!(response, b"SERVER_UP");
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_down_backend_and_bad_request() {
    let probe = SwitchProbe::new(false);
    let addr = start_server(Arc::clone(&probe)).await;

    assert_eq!(check(addr, "8675309").await, "SERVER_DN");
    assert_eq!(check(addr, "hello").await, "SERVER_DN");
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_each_request_probes_afresh() {
    let probe = SwitchProbe::new(true);
    let addr = start_server(Arc::clone(&probe)).await;

    assert_eq!(check(addr, "8675309").await, "SERVER_UP");
    probe.alive.store(false, Ordering::SeqCst);
    assert_eq!(check(addr, "8675309").await, "SERVER_DN");
    probe.alive.store(true, Ordering::SeqCst);
    assert_eq!(check(addr, "8675309").await, "SERVER_UP");

    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_get_their_own_replies() {
    let probe = SwitchProbe::new(true);
    let addr = start_server(Arc::clone(&probe)).await;

    let mut tasks = Vec::new();
    for i in 0..32 {
        let token = if i % 2 == 0 { "8675309" } else { "not-the-token" };
        tasks.push(tokio::spawn(async move { (token, check(addr, token).await) }));
    }

    for task in tasks {
        let (sent, reply) = task.await.unwrap();
        let expected = if sent == "8675309" { "SERVER_UP" } else { "SERVER_DN" };
        assert_eq!(reply, expected, "reply for {sent:?}");
    }

    assert_eq!(probe.calls.load(Ordering::SeqCst), 16);
}

#[tokio::test]
async fn test_silent_client_does_not_block_others() {
    let probe = SwitchProbe::new(true);
    let addr = start_server(Arc::clone(&probe)).await;

    // Connected but never sends; its handler waits forever on the read
    let _idle = TcpStream::connect(addr).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), check(addr, "8675309"))
        .await
        .expect("idle client blocked the accept loop");
    assert_eq!(reply, "SERVER_UP");
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = ServerConfig {
        address: "127.0.0.1".to_string(),
        port: taken.local_addr().unwrap().port(),
        ..ServerConfig::default()
    };

    let result = HealthCheckServer::new(Arc::new(config), SwitchProbe::new(true))
        .bind()
        .await;

    assert!(matches!(
        result,
        Err(dbcheck::error::DbCheckError::BindError { .. })
    ));
}
