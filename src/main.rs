//! Entry point: parse CLI args, bootstrap subsystems, serve until shutdown.

use clap::Parser;
use fleetfront::config::watcher::ConfigWatcher;
use fleetfront::lifecycle::shutdown::{ConnectionCountGuard, ShutdownCoordinator};
use fleetfront::lifecycle::signals::{next_signal, SignalAction};
use fleetfront::lifecycle::startup::bootstrap;
use fleetfront::net::listener::Listener;
use fleetfront::net::tls::{build_acceptor, SniCertResolver};
use fleetfront::observability::{logging, metrics::MetricsCollector};
use fleetfront::state::AppState;
use fleetfront::ConnectionDriver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;

#[derive(Debug, Parser)]
#[command(name = "fleetfront", version, about = "Reverse proxy and static web server")]
struct Cli {
    /// Path to the JSON configuration document.
    #[arg(default_value = "routes.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init("info");

    match run(cli.config).await {
        Ok(()) => {
            tracing::info!("shutdown complete");
            std::process::exit(0);
        }
        Err(error) => {
            tracing::error!(%error, "fatal startup error");
            std::process::exit(1);
        }
    }
}

async fn run(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let bootstrapped = bootstrap(&config_path).await?;
    let state = bootstrapped.state;
    let shared_config = bootstrapped.shared_config;
    let listener = bootstrapped.listener;
    let https_listener = bootstrapped.https_listener;

    // The recorder is installed once for the process lifetime; rendering
    // its text for an external scraper is the admin surface's job
    // (`MetricsCollector::export`), so no handle needs to live here.
    std::mem::forget(MetricsCollector::install());

    let tls_acceptor: Option<TlsAcceptor> = {
        let config = shared_config.load();
        if config.auto_https.enabled {
            let certs = state
                .certificates
                .clone()
                .expect("auto_https.enabled implies certificates were initialized at bootstrap");
            let default_domain = config.auto_https.allowed_domains.first().cloned();
            let resolver = Arc::new(SniCertResolver::new(certs, default_domain));
            Some(build_acceptor(resolver)?)
        } else {
            None
        }
    };

    let (watcher, mut config_updates) = ConfigWatcher::new(&config_path);
    let _watcher_handle = watcher.run()?;

    let shutdown = Arc::new(ShutdownCoordinator::new());

    let reload_state = state.clone();
    let mut reload_shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                update = config_updates.recv() => {
                    if update.is_none() {
                        break;
                    }
                    tracing::info!("publishing hot-reloaded configuration");
                    if let Err(error) = reload_state.router.reload_config() {
                        tracing::warn!(%error, "config reload failed, keeping previous snapshot");
                    }
                    reload_state.load_balancer.reload();
                }
                _ = reload_shutdown_rx.recv() => break,
            }
        }
    });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        loop {
            match next_signal().await {
                SignalAction::Shutdown => {
                    signal_shutdown.begin_shutdown();
                    break;
                }
                SignalAction::Reload => {
                    tracing::info!("SIGHUP received, forcing config reload");
                }
            }
        }
    });

    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "accepting plaintext connections");

    let plain_loop = accept_loop(listener, None, true, state.clone(), shutdown.clone());

    if let Some(https_listener) = https_listener {
        let https_addr = https_listener.local_addr()?;
        tracing::info!(addr = %https_addr, "accepting HTTPS connections");
        let https_loop = accept_loop(https_listener, tls_acceptor, false, state.clone(), shutdown.clone());
        tokio::join!(plain_loop, https_loop);
    } else {
        plain_loop.await;
    }

    shutdown.wait_for_drain(Duration::from_secs(30)).await;
    Ok(())
}

/// Accept connections on one listener until `shutdown` fires, spawning a
/// `ConnectionDriver` per connection. `tls_acceptor` is `Some` for the
/// HTTPS listener, `None` for the plaintext one; `is_plaintext` tells the
/// driver whether the HTTP→HTTPS redirect applies.
async fn accept_loop(
    listener: Listener,
    tls_acceptor: Option<TlsAcceptor>,
    is_plaintext: bool,
    state: Arc<AppState>,
    shutdown: Arc<ShutdownCoordinator>,
) {
    let mut shutdown_rx = shutdown.subscribe();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr, permit) = match accepted {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        tracing::warn!(%error, "failed to accept connection");
                        continue;
                    }
                };

                let conn_state = state.clone();
                let conn_tls = tls_acceptor.clone();
                let guard = ConnectionCountGuard::new(shutdown.active_connections());
                let conn_shutdown_rx: broadcast::Receiver<()> = shutdown.subscribe();

                tokio::spawn(async move {
                    let _permit = permit;
                    let _guard = guard;
                    let driver = ConnectionDriver::new(conn_state, is_plaintext);

                    let result = if let Some(acceptor) = conn_tls {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => driver.run(tls_stream, peer_addr, conn_shutdown_rx).await,
                            Err(error) => {
                                tracing::debug!(%error, "TLS handshake failed");
                                return;
                            }
                        }
                    } else {
                        driver.run(stream, peer_addr, conn_shutdown_rx).await
                    };

                    if let Err(error) = result {
                        tracing::debug!(%error, %peer_addr, "connection ended with an error");
                    }
                });
            }
            _ = shutdown_rx.recv() => {
                tracing::info!(local_addr = ?listener.local_addr(), "listener stopping, draining in-flight connections");
                break;
            }
        }
    }
}
