//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON)
//!     → loader.rs (parse, ${ENV} substitution, deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via ArcSwap to all subsystems
//!
//! On reload:
//!     watcher.rs polls mtime once per second
//!     → loader.rs reloads and validates
//!     → atomic swap of the published snapshot
//!     → subsystems observe the new snapshot on their next lookup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::ServerConfig;
