//! Shared utilities for integration and load testing.

use fleetfront::config::schema::ServerConfig;
use fleetfront::net::listener::Listener;
use fleetfront::routing::router::shared_config;
use fleetfront::state::AppState;
use fleetfront::ConnectionDriver;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// A running proxy instance bound to an OS-assigned port, for tests to talk
/// to directly. Dropping/`shutdown`-ing it aborts the accept loop.
pub struct TestProxy {
    pub addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl TestProxy {
    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Bring up a proxy serving `config` without a config file or watcher —
/// tests own the configuration directly and never reload it.
pub async fn start_proxy(mut config: ServerConfig) -> TestProxy {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let shared = shared_config(config.clone());
    let state = Arc::new(AppState::new(
        shared,
        PathBuf::from("unused.json"),
        Duration::from_secs(config.health_check.timeout_secs.max(1)),
    ));

    for backend_url in config.routes.values().chain(config.domain_routes.values()).flatten() {
        state.health.track(backend_url.clone(), config.health_check.clone());
    }

    let listener = Listener::bind(&config.listener).await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener has a local address");

    // Tests drive shutdown by aborting the accept task directly, so this
    // sender is never used; it just keeps each connection's receiver alive.
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let task = tokio::spawn(async move {
        loop {
            let (stream, peer_addr, permit) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => break,
            };
            let driver = ConnectionDriver::new(state.clone(), true);
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                let _permit = permit;
                let _ = driver.run(stream, peer_addr, shutdown_rx).await;
            });
        }
    });

    TestProxy { addr, task }
}

/// Start a simple mock backend that returns a fixed response, on an
/// OS-assigned port. Returns the address it ended up bound to.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a programmable mock backend on an OS-assigned port, calling `f` for
/// every request to decide the status and body. Returns the bound address.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
