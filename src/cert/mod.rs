//! Certificate storage and SNI resolution.
//!
//! # Data Flow
//! ```text
//! ACME issuance (acme::client) hands back a PEM chain + private key
//!     → manager.rs builds a rustls CertifiedKey
//!     → persisted to <cert_dir>/<domain>.p12 (alias "main", password "changeit")
//!     → installed in the in-memory map net::tls's SNI resolver reads from
//!
//! At startup, manager.rs loads every *.p12 file in cert_dir back into
//! that same map before the listener starts accepting TLS connections.
//! ```
//!
//! # Design Decisions
//! - PKCS12 persistence per domain keeps the on-disk format portable to
//!   tooling outside this proxy (openssl, keytool) for inspection
//! - The in-memory map is the source of truth while running; disk is only
//!   consulted at startup and after a fresh issuance

pub mod manager;

pub use manager::CertificateManager;
