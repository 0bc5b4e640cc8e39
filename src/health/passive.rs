//! Passive health checking (failure detection from live traffic).
//!
//! # Responsibilities
//! - Observe request outcomes on the proxied connection
//! - Feed them into the same `BackendHealth` counters the active prober uses
//!
//! # Design Decisions
//! - Only connection errors and 5xx responses count as failures
//! - Timeouts are failures
//! - 4xx responses are NOT failures: they indicate a client error, not a
//!   broken backend
//! - Counters are shared atomics, safe under concurrent request tracking

use crate::health::registry::HealthRegistry;
use std::sync::Arc;

/// The outcome of a single proxied request, as observed by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    ServerError,
    ConnectionFailure,
    Timeout,
}

impl RequestOutcome {
    pub fn from_status(status: u16) -> Self {
        if status >= 500 {
            RequestOutcome::ServerError
        } else {
            RequestOutcome::Success
        }
    }

    fn is_failure(self) -> bool {
        !matches!(self, RequestOutcome::Success)
    }
}

/// Record a request outcome against a backend's health counters.
pub fn observe(
    registry: &Arc<HealthRegistry>,
    backend_url: &str,
    outcome: RequestOutcome,
    failure_threshold: u32,
    success_threshold: u32,
) {
    let health = registry.get_or_create(backend_url);
    if outcome.is_failure() {
        health.record_failure(failure_threshold);
    } else {
        health.record_success(success_threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_not_failures() {
        assert_eq!(RequestOutcome::from_status(404), RequestOutcome::Success);
        assert!(!RequestOutcome::from_status(404).is_failure());
    }

    #[test]
    fn server_errors_are_failures() {
        assert_eq!(RequestOutcome::from_status(502), RequestOutcome::ServerError);
        assert!(RequestOutcome::from_status(502).is_failure());
    }

    #[test]
    fn observe_updates_backend_state() {
        let registry = Arc::new(HealthRegistry::new());
        observe(&registry, "http://a", RequestOutcome::ConnectionFailure, 1, 1);
        assert!(!registry.get_or_create("http://a").is_healthy());
    }
}
