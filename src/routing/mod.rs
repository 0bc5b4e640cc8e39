//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (host, path)
//!     → router.rs (host exact match, else longest path-prefix match)
//!     → Return: ordered candidate backend URLs, or no match
//!
//! Config reload:
//!     ServerConfig snapshot swapped atomically
//!     → Router re-reads routes/domain_routes from the new snapshot
//!     → round-robin counters reset
//! ```

pub mod matcher;
pub mod router;

pub use router::Router;
