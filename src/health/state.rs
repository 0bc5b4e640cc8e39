//! Backend health state machine.
//!
//! # States
//! - Healthy: backend is eligible for load balancing
//! - Unhealthy: backend excluded from selection
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= failure_threshold
//! Unhealthy → Healthy: consecutive successes >= success_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping: a single blip doesn't flip state
//! - Counters reset on every outcome that doesn't match the run in progress
//! - State changes logged for observability

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Per-backend health state, shared between the active prober and passive
/// request-outcome observer.
#[derive(Debug)]
pub struct BackendHealth {
    url: String,
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
}

impl BackendHealth {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Record a successful probe or request outcome. Returns `true` if this
    /// observation flipped the backend from unhealthy to healthy.
    pub fn record_success(&self, success_threshold: u32) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.healthy.load(Ordering::Relaxed) && successes >= success_threshold {
            self.healthy.store(true, Ordering::Relaxed);
            tracing::info!(backend = %self.url, "backend transitioned to healthy");
            return true;
        }
        false
    }

    /// Record a failed probe or request outcome. Returns `true` if this
    /// observation flipped the backend from healthy to unhealthy.
    pub fn record_failure(&self, failure_threshold: u32) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

        if self.healthy.load(Ordering::Relaxed) && failures >= failure_threshold {
            self.healthy.store(false, Ordering::Relaxed);
            tracing::warn!(backend = %self.url, "backend transitioned to unhealthy");
            return true;
        }
        false
    }
}
