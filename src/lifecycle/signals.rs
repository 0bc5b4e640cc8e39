//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//! - Trigger appropriate actions (shutdown, reload)
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Shutdown,
    Reload,
}

/// Wait for the next actionable signal. On Unix, SIGTERM and SIGINT map to
/// `Shutdown`, SIGHUP maps to `Reload`. On other platforms only Ctrl+C is
/// available and always means `Shutdown`.
#[cfg(unix)]
pub async fn next_signal() -> SignalAction {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to register SIGHUP handler");

    tokio::select! {
        _ = sigterm.recv() => SignalAction::Shutdown,
        _ = sigint.recv() => SignalAction::Shutdown,
        _ = sighup.recv() => SignalAction::Reload,
    }
}

#[cfg(not(unix))]
pub async fn next_signal() -> SignalAction {
    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    SignalAction::Shutdown
}
