//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-key token bucket / sliding / fixed window)
//!     → cors.rs (preflight short-circuit, Access-Control-* headers)
//!     → limits.rs (body size, header buffer size)
//!     → headers.rs (X-Forwarded-*, hop-by-hop stripping)
//!     → routing
//! ```
//!
//! # Design Decisions
//! - Defense in depth: each layer checks independently of the others
//! - Fail closed: reject on any check failure rather than best-effort pass
//! - No trust in client-supplied `X-Forwarded-*` as the sole source of the
//!   connecting address

pub mod cors;
pub mod headers;
pub mod limits;
pub mod rate_limit;
