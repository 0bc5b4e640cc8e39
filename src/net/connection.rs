//! Connection state machine and lifecycle tracking.
//!
//! # State Machine
//! ```text
//! ┌──────────┐     ┌────────────┐     ┌────────┐     ┌────────┐
//! │ Accepting│────▶│  Active    │────▶│Draining│────▶│ Closed │
//! └──────────┘     └────────────┘     └────────┘     └────────┘
//! ```
//!
//! # Design Decisions
//! - Connection ID is u64 for speed; collision risk acceptable
//! - State transitions are explicit, not implicit
//! - Draining state allows an in-flight request to finish before close

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepting,
    Active,
    Draining,
    Closed,
}

/// Per-connection bookkeeping: an id for tracing correlation and the
/// current lifecycle state. A `ConnectionDriver` owns exactly one of these
/// for the lifetime of its socket.
pub struct ConnectionTracker {
    id: u64,
    state: Mutex<ConnectionState>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(ConnectionState::Accepting),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub fn mark_active(&self) {
        *self.state.lock().unwrap() = ConnectionState::Active;
    }

    /// Begin graceful shutdown: the current in-flight request (if any)
    /// should finish, but no new request should be read off the socket.
    pub fn begin_draining(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == ConnectionState::Active || *state == ConnectionState::Accepting {
            *state = ConnectionState::Draining;
        }
    }

    pub fn mark_closed(&self) {
        *self.state.lock().unwrap() = ConnectionState::Closed;
    }

    pub fn should_accept_next_request(&self) -> bool {
        self.state() != ConnectionState::Draining && self.state() != ConnectionState::Closed
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = ConnectionTracker::new();
        let b = ConnectionTracker::new();
        assert!(b.id() > a.id());
    }

    #[test]
    fn starts_accepting_and_transitions_forward() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.state(), ConnectionState::Accepting);
        tracker.mark_active();
        assert_eq!(tracker.state(), ConnectionState::Active);
        tracker.begin_draining();
        assert_eq!(tracker.state(), ConnectionState::Draining);
        assert!(!tracker.should_accept_next_request());
        tracker.mark_closed();
        assert_eq!(tracker.state(), ConnectionState::Closed);
    }

    #[test]
    fn draining_does_not_regress_from_closed() {
        let tracker = ConnectionTracker::new();
        tracker.mark_closed();
        tracker.begin_draining();
        assert_eq!(tracker.state(), ConnectionState::Closed);
    }
}
