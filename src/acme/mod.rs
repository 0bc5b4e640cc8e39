//! ACME v2 (RFC 8555) client, hand-rolled HTTP-01 flow only.
//!
//! # Data Flow
//! ```text
//! CertificateManager notices a domain needs a certificate
//!     → client.rs: fetch directory, ensure account, create order
//!     → for each authorization: register the HTTP-01 challenge token
//!       in ChallengeStore
//!     → ConnectionDriver serves GET /.well-known/acme-challenge/{token}
//!       directly from ChallengeStore, ahead of routing
//!     → client.rs tells the CA the challenge is ready, polls until valid
//!     → csr.rs builds a CSR, client.rs finalizes the order
//!     → client.rs downloads the issued chain
//!     → CertificateManager persists it as PKCS12 and installs it for SNI
//! ```
//!
//! # Design Decisions
//! - No ACME client library: the protocol surface this proxy needs
//!   (directory, account, order, HTTP-01 challenge, finalize, download) is
//!   a handful of signed JSON POSTs, and hand-rolling it keeps the JWS
//!   signing code auditable end to end
//! - `reqwest` is used only for the HTTPS transport to the CA, never for
//!   proxying client traffic

pub mod client;
pub mod csr;
pub mod jws;

use dashmap::DashMap;
use std::sync::Arc;

/// Shared store of in-flight HTTP-01 challenge tokens. The connection
/// driver consults this directly, ahead of routing, for any GET to
/// `/.well-known/acme-challenge/*`.
#[derive(Debug, Default, Clone)]
pub struct ChallengeStore {
    tokens: Arc<DashMap<String, String>>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: String, key_authorization: String) {
        self.tokens.insert(token, key_authorization);
    }

    pub fn lookup(&self, token: &str) -> Option<String> {
        self.tokens.get(token).map(|v| v.clone())
    }

    pub fn remove(&self, token: &str) {
        self.tokens.remove(token);
    }
}
