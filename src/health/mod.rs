//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer, one task per backend
//!     → probe the configured health path
//!     → update registry.rs
//!
//! Passive health checks (passive.rs):
//!     Relay observes a request outcome
//!     → update registry.rs with the same counters
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy, hysteresis via consecutive success/failure counts
//! ```
//!
//! # Design Decisions
//! - Active and passive checks share one `BackendHealth` per backend
//! - State transitions require consecutive successes/failures, not single blips
//! - Health state is per-backend, not per-pool

pub mod active;
pub mod passive;
pub mod registry;
pub mod state;

use crate::config::schema::HealthCheckConfig;
use active::ActiveHealthChecker;
use registry::HealthRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Facade combining the shared registry with the active prober, exposed to
/// the rest of the proxy and to the admin surface (`snapshot_all`).
pub struct HealthChecker {
    registry: Arc<HealthRegistry>,
    prober: Arc<ActiveHealthChecker>,
}

impl HealthChecker {
    pub fn new(timeout: Duration) -> Self {
        let registry = Arc::new(HealthRegistry::new());
        let prober = Arc::new(ActiveHealthChecker::new(registry.clone(), timeout));
        Self { registry, prober }
    }

    pub fn registry(&self) -> &Arc<HealthRegistry> {
        &self.registry
    }

    /// Start (or restart) the active prober for a backend per the current
    /// configuration. Safe to call repeatedly; each call spawns a fresh
    /// probe task so a config reload picks up a changed interval/path.
    pub fn track(&self, backend_url: String, config: HealthCheckConfig) {
        self.prober.clone().spawn(backend_url, config);
    }

    pub fn is_healthy(&self, url: &str) -> bool {
        self.registry.is_healthy(url)
    }

    /// Admin contract: `HealthChecker::snapshot_all`.
    pub fn snapshot_all(&self) -> Vec<(String, bool)> {
        self.registry.snapshot_all()
    }
}
