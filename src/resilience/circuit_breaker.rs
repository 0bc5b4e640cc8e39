//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if the backend has recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: after open_timeout has elapsed
//! Half-Open → Closed: `half_open_probes` consecutive probe successes
//! Half-Open → Open: a probe request fails
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global)
//! - Fail fast in Open state, no waiting for a timeout per request
//! - At most `half_open_probes` requests admitted concurrently while Half-Open
//! - `state_entered_at` uses a monotonic clock (`Instant`), never wall time

use crate::config::schema::CircuitBreakerConfig;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug)]
struct CircuitBreakerState {
    state: AtomicU8,
    failure_count: AtomicU32,
    half_open_probes_in_flight: AtomicU32,
    half_open_successes: AtomicU32,
    state_entered_at: Mutex<Instant>,
    last_failure_at: Mutex<Option<Instant>>,
}

impl CircuitBreakerState {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed.as_u8()),
            failure_count: AtomicU32::new(0),
            half_open_probes_in_flight: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            state_entered_at: Mutex::new(Instant::now()),
            last_failure_at: Mutex::new(None),
        }
    }

    fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition_to(&self, new_state: CircuitState, backend: &str) {
        self.state.store(new_state.as_u8(), Ordering::Release);
        *self.state_entered_at.lock().unwrap() = Instant::now();
        self.half_open_probes_in_flight.store(0, Ordering::Relaxed);
        self.half_open_successes.store(0, Ordering::Relaxed);
        tracing::info!(backend, state = ?new_state, "circuit breaker state change");
    }

    fn try_acquire_half_open_probe(&self, half_open_probes: u32) -> bool {
        let mut in_flight = self.half_open_probes_in_flight.load(Ordering::Relaxed);
        loop {
            if in_flight >= half_open_probes {
                return false;
            }
            match self.half_open_probes_in_flight.compare_exchange_weak(
                in_flight,
                in_flight + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(x) => in_flight = x,
            }
        }
    }
}

/// Per-backend circuit breaker registry.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    backends: DashMap<String, Arc<CircuitBreakerState>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, backend_url: &str) -> Arc<CircuitBreakerState> {
        self.backends
            .entry(backend_url.to_string())
            .or_insert_with(|| Arc::new(CircuitBreakerState::new()))
            .clone()
    }

    /// Whether a request to `backend_url` may proceed right now.
    pub fn allow_request(&self, backend_url: &str, config: &CircuitBreakerConfig) -> bool {
        if !config.enabled {
            return true;
        }
        let state = self.entry(backend_url);

        match state.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = state.state_entered_at.lock().unwrap().elapsed();
                if elapsed >= Duration::from_secs(config.open_timeout_secs) {
                    state.transition_to(CircuitState::HalfOpen, backend_url);
                    state.try_acquire_half_open_probe(config.half_open_probes)
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => state.try_acquire_half_open_probe(config.half_open_probes),
        }
    }

    pub fn record_success(&self, backend_url: &str, config: &CircuitBreakerConfig) {
        if !config.enabled {
            return;
        }
        let state = self.entry(backend_url);
        match state.state() {
            CircuitState::HalfOpen => {
                let successes = state.half_open_successes.fetch_add(1, Ordering::Relaxed) + 1;
                if successes >= config.half_open_probes {
                    state.transition_to(CircuitState::Closed, backend_url);
                }
            }
            CircuitState::Closed => state.failure_count.store(0, Ordering::Relaxed),
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, backend_url: &str, config: &CircuitBreakerConfig) {
        if !config.enabled {
            return;
        }
        let state = self.entry(backend_url);
        let now = Instant::now();

        match state.state() {
            CircuitState::HalfOpen => {
                state.transition_to(CircuitState::Open, backend_url);
            }
            CircuitState::Closed => {
                let mut last_failure = state.last_failure_at.lock().unwrap();
                let stale = last_failure
                    .map(|t| now.duration_since(t) >= Duration::from_secs(config.reset_timeout_secs))
                    .unwrap_or(false);
                if stale {
                    state.failure_count.store(0, Ordering::Relaxed);
                }
                *last_failure = Some(now);
                drop(last_failure);

                let count = state.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
                if count >= config.failure_threshold {
                    state.transition_to(CircuitState::Open, backend_url);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Admin contract: `CircuitBreaker::reset`.
    pub fn reset(&self, backend_url: &str) {
        if let Some(state) = self.backends.get(backend_url) {
            state.transition_to(CircuitState::Closed, backend_url);
            state.failure_count.store(0, Ordering::Relaxed);
        }
    }

    /// Admin contract: `CircuitBreaker::reset_all`.
    pub fn reset_all(&self) {
        for entry in self.backends.iter() {
            entry.value().transition_to(CircuitState::Closed, entry.key());
            entry.value().failure_count.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot_all(&self) -> Vec<(String, CircuitState)> {
        self.backends
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: true,
            failure_threshold: 3,
            open_timeout_secs: 0,
            reset_timeout_secs: 3600,
            half_open_probes: 1,
        }
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new();
        let cfg = config();
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        assert!(cb.allow_request("http://a", &cfg));
        cb.record_failure("http://a", &cfg);
        assert!(!cb.allow_request("http://a", &cfg));
    }

    #[test]
    fn half_open_admits_only_configured_probe_count() {
        let cb = CircuitBreaker::new();
        let mut cfg = config();
        cfg.half_open_probes = 1;
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        assert!(!cb.allow_request("http://a", &cfg)); // open, timeout not yet elapsed... but open_timeout=0

        // open_timeout is 0 above so the very next call transitions to half-open
        // and admits exactly one probe.
        assert!(cb.allow_request("http://a", &cfg));
    }

    #[test]
    fn failed_probe_reopens_circuit() {
        let cb = CircuitBreaker::new();
        let cfg = config();
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        cb.allow_request("http://a", &cfg); // transitions to half-open, consumes the probe
        cb.record_failure("http://a", &cfg);
        assert!(!cb.allow_request("http://a", &cfg));
    }

    #[test]
    fn successful_probe_closes_circuit() {
        let cb = CircuitBreaker::new();
        let cfg = config();
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        cb.allow_request("http://a", &cfg);
        cb.record_success("http://a", &cfg);
        assert!(cb.allow_request("http://a", &cfg));
        assert!(cb.allow_request("http://a", &cfg));
    }

    #[test]
    fn two_consecutive_probe_successes_close_circuit_when_configured() {
        let cb = CircuitBreaker::new();
        let mut cfg = config();
        cfg.half_open_probes = 2;
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        assert!(cb.allow_request("http://a", &cfg)); // transitions to half-open, first probe

        cb.record_success("http://a", &cfg);
        // Only one of two required successes so far: circuit stays half-open,
        // but the first probe slot is already spent, so a second probe is
        // admitted to make room for the second success.
        assert!(cb.allow_request("http://a", &cfg));
        assert_eq!(cb.snapshot_all()[0].1, CircuitState::HalfOpen);

        cb.record_success("http://a", &cfg);
        assert_eq!(cb.snapshot_all()[0].1, CircuitState::Closed);
        assert!(cb.allow_request("http://a", &cfg));
    }

    #[test]
    fn reset_forces_closed() {
        let cb = CircuitBreaker::new();
        let cfg = config();
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        cb.reset("http://a");
        assert!(cb.allow_request("http://a", &cfg));
    }

    #[test]
    fn disabled_breaker_always_allows() {
        let cb = CircuitBreaker::new();
        let cfg = CircuitBreakerConfig {
            enabled: false,
            ..config()
        };
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        cb.record_failure("http://a", &cfg);
        assert!(cb.allow_request("http://a", &cfg));
    }
}
