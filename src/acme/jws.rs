//! JWS construction for ACME v2 (RFC 8555 §6.2).
//!
//! # Responsibilities
//! - Base64url (no padding) encode protected header / payload / signature
//! - Build the JWK representation of an RSA public key
//! - Compute the JWK thumbprint (RFC 7638) used as the HTTP-01 key
//!   authorization suffix
//!
//! # Design Decisions
//! - No JWT/JWS library: ACME's flattened JWS serialization is a handful
//!   of JSON fields signed with RS256, cheap enough to hand-roll and avoid
//!   pulling in a general-purpose JOSE stack for one request shape
//! - JWK member order in the thumbprint input is fixed and alphabetical
//!   (`e`, `kty`, `n`) per RFC 7638 — this is not negotiable, the digest
//!   changes if the order does

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub fn b64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// The JWK representation of an RSA public key, per RFC 7517.
pub fn jwk(key: &RsaPrivateKey) -> Value {
    let public = key.to_public_key();
    json!({
        "kty": "RSA",
        "n": b64url(&public.n().to_bytes_be()),
        "e": b64url(&public.e().to_bytes_be()),
    })
}

/// RFC 7638 thumbprint: SHA-256 over the canonical JSON encoding of the
/// JWK's required members, in lexicographic key order.
pub fn jwk_thumbprint(key: &RsaPrivateKey) -> String {
    let public = key.to_public_key();
    let canonical = format!(
        "{{\"e\":\"{}\",\"kty\":\"RSA\",\"n\":\"{}\"}}",
        b64url(&public.e().to_bytes_be()),
        b64url(&public.n().to_bytes_be()),
    );
    let digest = Sha256::digest(canonical.as_bytes());
    b64url(&digest)
}

/// A signed ACME request body: the flattened JWS serialization ACME
/// servers expect as a POST body.
#[derive(Debug, serde::Serialize)]
pub struct SignedRequest {
    protected: String,
    payload: String,
    signature: String,
}

/// Sign `payload` (already-serialized JSON, or an empty string for a
/// POST-as-GET) for `url`, authenticated either by embedding the full JWK
/// (account creation) or by account `kid` (every request after).
pub fn sign(
    key: &RsaPrivateKey,
    url: &str,
    nonce: &str,
    payload_json: Option<&Value>,
    auth: JwsAuth<'_>,
) -> SignedRequest {
    let mut protected = json!({
        "alg": "RS256",
        "nonce": nonce,
        "url": url,
    });
    match auth {
        JwsAuth::Jwk => {
            protected["jwk"] = jwk(key);
        }
        JwsAuth::Kid(kid) => {
            protected["kid"] = Value::String(kid.to_string());
        }
    }

    let protected_b64 = b64url(protected.to_string().as_bytes());
    let payload_b64 = match payload_json {
        Some(value) => b64url(value.to_string().as_bytes()),
        None => String::new(),
    };

    let signing_input = format!("{protected_b64}.{payload_b64}");
    let signing_key = SigningKey::<Sha256>::new(key.clone());
    let signature = signing_key.sign(signing_input.as_bytes());

    SignedRequest {
        protected: protected_b64,
        payload: payload_b64,
        signature: b64url(&signature.to_bytes()),
    }
}

pub enum JwsAuth<'a> {
    Jwk,
    Kid(&'a str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> RsaPrivateKey {
        // Small key: tests only exercise encoding/shape, not cryptographic
        // strength, so a short modulus keeps them fast.
        RsaPrivateKey::new(&mut rand::thread_rng(), 512).unwrap()
    }

    #[test]
    fn thumbprint_is_stable_for_the_same_key() {
        let key = test_key();
        assert_eq!(jwk_thumbprint(&key), jwk_thumbprint(&key));
    }

    #[test]
    fn different_keys_produce_different_thumbprints() {
        let a = test_key();
        let b = test_key();
        assert_ne!(jwk_thumbprint(&a), jwk_thumbprint(&b));
    }

    #[test]
    fn signed_request_has_three_nonempty_segments_for_jwk_auth() {
        let key = test_key();
        let request = sign(&key, "https://example.com/acme/new-order", "nonce-1", None, JwsAuth::Jwk);
        assert!(!request.protected.is_empty());
        assert!(request.payload.is_empty());
        assert!(!request.signature.is_empty());
    }
}
