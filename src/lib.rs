//! Reverse proxy core library.
//!
//! # Data Flow
//! ```text
//! net::listener (accept loop, backpressure)
//!     → net::tls (SNI cert resolution, optional)
//!     → http::driver (per-connection request loop)
//!         → security (rate limit, CORS, header hygiene, body limits)
//!         → routing + load_balancer (backend selection)
//!         → health + resilience (eligibility gating, outcome recording)
//!         → http::relay (byte-for-byte forwarding)
//!     → observability (structured logs, metrics)
//! acme + cert (certificate acquisition and SNI-facing storage)
//! config (load, validate, hot-reload)
//! admin (external-facing facade over the contract methods below)
//! lifecycle (startup sequencing, graceful shutdown, signal handling)
//! ```

pub mod acme;
pub mod admin;
pub mod cert;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod state;

pub use config::schema::ServerConfig;
pub use http::driver::ConnectionDriver;
pub use state::AppState;
