//! External admin surface contract.
//!
//! # Design Decisions
//! - The HTTP surface for `/admin/*` is deliberately external to this core
//!   (`ConnectionDriver` answers 404 for every `/admin/*` request, see
//!   `http::driver`). This module is what an external admin process links
//!   against: plain Rust methods over `AppState`, no axum/tower here.
//! - Authentication is likewise just data: `auth::verify_api_key` and
//!   `auth::verify_ip_allowed` are pure functions an external HTTP layer
//!   calls before invoking anything below.

pub mod auth;
pub mod handlers;

use crate::state::AppState;
use handlers::{BackendStatus, SystemStatus};
use std::sync::Arc;

/// Facade over every operation the external admin surface is allowed to
/// perform, bundling references into one `AppState`.
pub struct AdminApi {
    state: Arc<AppState>,
}

impl AdminApi {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn status(&self) -> SystemStatus {
        handlers::system_status()
    }

    /// Health + circuit breaker + active-connection snapshot for every
    /// backend this instance has ever routed to.
    pub fn backends(&self) -> Vec<BackendStatus> {
        handlers::backend_statuses(&self.state)
    }

    /// Admin contract: `Router::reload_config`.
    pub fn reload_config(&self) -> Result<(), crate::config::loader::ConfigError> {
        self.state.router.reload_config()
    }

    /// Admin contract: `CircuitBreaker::reset`.
    pub fn reset_circuit(&self, backend_url: &str) {
        self.state.circuit_breaker.reset(backend_url);
    }

    /// Admin contract: `CircuitBreaker::reset_all`.
    pub fn reset_all_circuits(&self) {
        self.state.circuit_breaker.reset_all();
    }

    /// Admin contract: `RateLimiter::reset`.
    pub fn reset_rate_limit(&self, key: &str) {
        self.state.rate_limiter.reset(key);
    }

    /// Admin contract: `HealthChecker::snapshot_all`.
    pub fn health_snapshot(&self) -> Vec<(String, bool)> {
        self.state.health.snapshot_all()
    }
}
