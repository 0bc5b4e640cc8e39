//! Certificate signing request construction.
//!
//! # Responsibilities
//! - Generate a 2048-bit RSA key pair for a domain
//! - Build a PKCS#10 CSR (CN + SAN matching the order's identifiers)
//!
//! # Design Decisions
//! - `rcgen` is used purely as a DER encoder for the CSR structure, not as
//!   an ACME client: it never talks to a CA. The RSA key itself is
//!   generated by the `rsa` crate (ring, which `rcgen` builds on, cannot
//!   generate RSA keys — only sign with them), then imported into `rcgen`
//!   as a `KeyPair` for CSR serialization.
//! - The private key is returned alongside the CSR: callers must hold it
//!   to pair with the certificate ACME eventually issues (see the
//!   finalize-order Open Question in DESIGN.md).

use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;

pub struct CsrBundle {
    pub private_key_pkcs8_der: Vec<u8>,
    pub csr_der: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum CsrError {
    #[error("failed to generate RSA key pair: {0}")]
    KeyGeneration(#[from] rsa::Error),
    #[error("failed to encode private key: {0}")]
    Encoding(#[from] rsa::pkcs8::Error),
    #[error("failed to build certificate signing request: {0}")]
    Rcgen(#[from] rcgen::Error),
}

/// Generate a fresh RSA-2048 key and a CSR for `domain`, with `domain` as
/// both the CN and the sole SAN entry.
pub fn generate(domain: &str) -> Result<CsrBundle, CsrError> {
    let rsa_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)?;
    let pkcs8_der = rsa_key.to_pkcs8_der()?;
    let pkcs8_bytes = pkcs8_der.as_bytes().to_vec();

    let key_pair = rcgen::KeyPair::from_pkcs8_der_and_sign_algo(
        &rcgen::PrivateKeyDer::Pkcs8(pkcs8_bytes.clone().into()),
        &rcgen::PKCS_RSA_SHA256,
    )?;

    let mut params = rcgen::CertificateParams::new(vec![domain.to_string()])?;
    params.distinguished_name = rcgen::DistinguishedName::new();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, domain);

    let csr = params.serialize_request(&key_pair)?;

    Ok(CsrBundle {
        private_key_pkcs8_der: pkcs8_bytes,
        csr_der: csr.der().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_csr_and_matching_key() {
        let bundle = generate("example.com").unwrap();
        assert!(!bundle.csr_der.is_empty());
        assert!(!bundle.private_key_pkcs8_der.is_empty());
    }
}
