//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (enforce connect/request deadline)
//!     → circuit_breaker.rs (per-backend Closed/Open/Half-Open gate)
//!
//! ACME polling (acme module) reuses backoff.rs for its retry delay.
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Circuit breaker prevents cascading failures into an already-down backend
//! - No request-retry layer: the spec's relay forwards exactly once per
//!   client request and surfaces backend failure directly

pub mod backoff;
pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::CircuitBreaker;
