//! Data shapes returned by `AdminApi`, and the logic to build them.

use crate::resilience::circuit_breaker::CircuitState;
use crate::state::AppState;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

pub fn system_status() -> SystemStatus {
    SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    }
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub url: String,
    pub healthy: bool,
    pub circuit_state: &'static str,
    pub active_connections: usize,
}

fn circuit_state_label(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half-open",
    }
}

/// Join the three per-backend registries (health, circuit breaker,
/// connection counts) into one snapshot row per backend.
pub fn backend_statuses(state: &AppState) -> Vec<BackendStatus> {
    let circuits: std::collections::HashMap<String, CircuitState> =
        state.circuit_breaker.snapshot_all().into_iter().collect();

    state
        .load_balancer
        .registry()
        .all()
        .into_iter()
        .map(|backend| {
            let circuit_state = circuits.get(&backend.url).copied().unwrap_or(CircuitState::Closed);
            BackendStatus {
                url: backend.url.clone(),
                healthy: state.health.is_healthy(&backend.url),
                circuit_state: circuit_state_label(circuit_state),
                active_connections: backend.active_connections(),
            }
        })
        .collect()
}
