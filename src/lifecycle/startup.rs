//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize all subsystems in dependency order
//! - Start background tasks (health checks, rate-limit sweeper)
//! - Bind listeners (traffic only begins once everything above succeeded)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, caller maps it to a nonzero exit
//! - Subsystems initialize in order, not concurrently: health tracking and
//!   the rate-limit sweeper both need `AppState` to already exist
//! - Listener binds last

use crate::cert::manager::CertError;
use crate::cert::CertificateManager;
use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::ListenerConfig;
use crate::net::listener::{Listener, ListenerError};
use crate::routing::router::{shared_config, SharedConfig};
use crate::security::rate_limit::spawn_sweeper;
use crate::state::AppState;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to bind listener: {0}")]
    Listener(#[from] ListenerError),
    #[error("failed to initialize certificate store: {0}")]
    Cert(#[from] CertError),
}

/// Everything `main` needs to start serving: the shared application state,
/// the live config handle (for the watcher to publish into), the bound
/// plaintext listener, and — when auto-HTTPS is enabled — a second listener
/// bound on `auto_https.https_port` for TLS traffic. Neither is accepting
/// yet.
pub struct Bootstrapped {
    pub state: Arc<AppState>,
    pub shared_config: SharedConfig,
    pub listener: Listener,
    pub https_listener: Option<Listener>,
}

/// Load config, build every subsystem, start background tasks, and bind the
/// listener(s). Does not start accepting connections.
pub async fn bootstrap(config_path: &Path) -> Result<Bootstrapped, StartupError> {
    let config = load_config(config_path)?;
    tracing::info!(bind = %config.listener.bind_address, "configuration loaded");

    let shared = shared_config(config.clone());
    let mut state = AppState::new(
        shared.clone(),
        config_path.to_path_buf(),
        Duration::from_secs(config.health_check.timeout_secs.max(1)),
    );

    if config.auto_https.enabled {
        let certs = Arc::new(CertificateManager::new(PathBuf::from(&config.auto_https.cert_dir))?);
        certs.load_existing()?;
        state.certificates = Some(certs);
    }

    let state = Arc::new(state);

    for backend_url in config
        .routes
        .values()
        .chain(config.domain_routes.values())
        .flatten()
    {
        if backend_url.starts_with("file://") {
            continue;
        }
        state.health.track(backend_url.clone(), config.health_check.clone());
    }

    spawn_sweeper(state.rate_limiter.clone(), Duration::from_secs(300), Duration::from_secs(60));

    let listener = Listener::bind(&config.listener).await?;

    let https_listener = if config.auto_https.enabled {
        let plain_addr: SocketAddr = config
            .listener
            .bind_address
            .parse()
            .map_err(|e| ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
        let https_addr = SocketAddr::new(plain_addr.ip(), config.auto_https.https_port);
        let https_config = ListenerConfig {
            bind_address: https_addr.to_string(),
            max_connections: config.listener.max_connections,
        };
        tracing::info!(bind = %https_config.bind_address, "binding HTTPS listener");
        Some(Listener::bind(&https_config).await?)
    } else {
        None
    };

    Ok(Bootstrapped { state, shared_config: shared, listener, https_listener })
}
