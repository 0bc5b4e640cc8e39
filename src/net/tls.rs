//! TLS termination: acceptor construction and SNI-driven certificate
//! resolution.
//!
//! # Design Decisions
//! - No `axum-server`: the listener hands raw `TcpStream`s to
//!   `tokio_rustls::TlsAcceptor` directly, since the HTTP layer is a
//!   hand-rolled parser, not an axum/hyper service.
//! - `SniCertResolver` looks certificates up in `CertificateManager` by the
//!   SNI hostname on every handshake, so a certificate installed by a fresh
//!   ACME issuance is picked up without restarting the listener.
//! - ALPN is restricted to `http/1.1`: this proxy never negotiates HTTP/2.

use crate::cert::CertificateManager;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig as RustlsServerConfig;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Resolves a `CertifiedKey` for an incoming TLS handshake from the SNI
/// hostname, falling back to `default_domain` when SNI is absent or the
/// requested host has no certificate installed.
#[derive(Debug)]
pub struct SniCertResolver {
    certs: Arc<CertificateManager>,
    default_domain: Option<String>,
}

impl SniCertResolver {
    pub fn new(certs: Arc<CertificateManager>, default_domain: Option<String>) -> Self {
        Self { certs, default_domain }
    }
}

impl ResolvesServerCert for SniCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        if let Some(name) = client_hello.server_name() {
            if let Some(key) = self.certs.get(name) {
                return Some(key);
            }
        }
        let fallback = self.default_domain.as_deref()?;
        self.certs.get(fallback)
    }
}

/// Build a `TlsAcceptor` that resolves certificates per-connection via
/// `resolver`, offering only `http/1.1` over ALPN.
pub fn build_acceptor(resolver: Arc<SniCertResolver>) -> Result<TlsAcceptor, rustls::Error> {
    let mut server_config = RustlsServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(resolver);
    server_config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
