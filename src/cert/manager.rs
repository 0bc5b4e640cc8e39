//! Per-domain certificate storage, PKCS12 persistence, and renewal checks.

use dashmap::DashMap;
use rustls::sign::CertifiedKey;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const PKCS12_PASSWORD: &str = "changeit";
const PKCS12_ALIAS: &str = "main";

#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse PEM certificate chain")]
    InvalidPem,
    #[error("no signing key available for the supplied private key")]
    UnsupportedKey,
    #[error("failed to parse certificate expiry: {0}")]
    Expiry(String),
}

pub struct CertificateManager {
    cert_dir: PathBuf,
    certified_keys: DashMap<String, Arc<CertifiedKey>>,
}

impl CertificateManager {
    pub fn new(cert_dir: impl Into<PathBuf>) -> Result<Self, CertError> {
        let cert_dir = cert_dir.into();
        std::fs::create_dir_all(&cert_dir)?;
        Ok(Self {
            cert_dir,
            certified_keys: DashMap::new(),
        })
    }

    fn pkcs12_path(&self, domain: &str) -> PathBuf {
        self.cert_dir.join(format!("{domain}.p12"))
    }

    /// Install a freshly issued certificate chain (PEM) with its private
    /// key (PKCS8 DER) for `domain`: build the rustls signing key,
    /// persist it as PKCS12, and make it available for SNI resolution.
    pub fn install(&self, domain: &str, cert_chain_pem: &str, private_key_pkcs8_der: &[u8]) -> Result<(), CertError> {
        let cert_der = parse_pem_chain(cert_chain_pem)?;
        let certified_key = build_certified_key(&cert_der, private_key_pkcs8_der)?;

        let leaf_der = cert_der.first().ok_or(CertError::InvalidPem)?.to_vec();
        let pfx = p12::PFX::new(&leaf_der, private_key_pkcs8_der, None, PKCS12_PASSWORD, PKCS12_ALIAS)
            .ok_or(CertError::UnsupportedKey)?;
        std::fs::write(self.pkcs12_path(domain), pfx.to_der())?;

        self.certified_keys.insert(domain.to_string(), Arc::new(certified_key));
        tracing::info!(domain, "certificate installed");
        Ok(())
    }

    pub fn get(&self, domain: &str) -> Option<Arc<CertifiedKey>> {
        self.certified_keys.get(domain).map(|entry| entry.clone())
    }

    pub fn has(&self, domain: &str) -> bool {
        self.certified_keys.contains_key(domain)
    }

    /// Whether `domain`'s installed certificate expires within `renew_before`.
    pub fn needs_renewal(&self, domain: &str, renew_before: Duration) -> bool {
        let Some(certified_key) = self.get(domain) else {
            return true;
        };
        let Some(leaf) = certified_key.cert.first() else {
            return true;
        };
        match x509_parser::parse_x509_certificate(leaf.as_ref()) {
            Ok((_, cert)) => {
                let not_after = cert.validity().not_after.timestamp();
                let renew_at = not_after - renew_before.as_secs() as i64;
                now_unix_timestamp() >= renew_at
            }
            Err(_) => true,
        }
    }

    /// Load every `*.p12` file already on disk into memory, for startup.
    pub fn load_existing(&self) -> Result<(), CertError> {
        if !self.cert_dir.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.cert_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("p12") {
                continue;
            }
            let Some(domain) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Err(error) = self.load_one(domain, &path) {
                tracing::warn!(domain, %error, "failed to load persisted certificate, skipping");
            }
        }
        Ok(())
    }

    fn load_one(&self, domain: &str, path: &Path) -> Result<(), CertError> {
        let bytes = std::fs::read(path)?;
        let pfx = p12::PFX::parse(&bytes).map_err(|_| CertError::InvalidPem)?;
        let (cert_der, key_der) = pfx
            .cert_and_key(PKCS12_PASSWORD)
            .ok_or(CertError::UnsupportedKey)?;
        let certified_key = build_certified_key(&[cert_der], &key_der)?;
        self.certified_keys.insert(domain.to_string(), Arc::new(certified_key));
        Ok(())
    }
}

fn parse_pem_chain(pem: &str) -> Result<Vec<Vec<u8>>, CertError> {
    let mut reader = std::io::BufReader::new(pem.as_bytes());
    rustls_pemfile::certs(&mut reader)
        .map(|result| result.map(|der| der.to_vec()).map_err(|_| CertError::InvalidPem))
        .collect()
}

fn build_certified_key(cert_der: &[Vec<u8>], private_key_pkcs8_der: &[u8]) -> Result<CertifiedKey, CertError> {
    let chain: Vec<rustls::pki_types::CertificateDer<'static>> = cert_der
        .iter()
        .map(|der| rustls::pki_types::CertificateDer::from(der.clone()))
        .collect();
    let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(private_key_pkcs8_der.to_vec().into());
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key_der)
        .map_err(|_| CertError::UnsupportedKey)?;
    Ok(CertifiedKey::new(chain, signing_key))
}

fn now_unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
