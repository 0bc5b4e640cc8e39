//! ACME v2 protocol client (directory, account, order, HTTP-01 challenge,
//! finalize, download).

use crate::acme::jws::{sign, JwsAuth};
use crate::resilience::backoff::calculate_backoff;
use rsa::RsaPrivateKey;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Mutex;

const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

#[derive(Debug, thiserror::Error)]
pub enum AcmeError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed ACME response: {0}")]
    Malformed(String),
    #[error("ACME server rejected the request: {0}")]
    Rejected(String),
    #[error("authorization {0} did not become valid")]
    AuthorizationFailed(String),
    #[error("order {0} did not finalize in time")]
    OrderNotReady(String),
    #[error("key generation error: {0}")]
    Key(#[from] rsa::Error),
}

#[derive(Debug, Deserialize)]
pub struct Directory {
    #[serde(rename = "newNonce")]
    pub new_nonce: String,
    #[serde(rename = "newAccount")]
    pub new_account: String,
    #[serde(rename = "newOrder")]
    pub new_order: String,
}

#[derive(Debug, Deserialize)]
pub struct Order {
    pub status: String,
    pub authorizations: Vec<String>,
    pub finalize: String,
    pub certificate: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Authorization {
    pub status: String,
    pub challenges: Vec<Challenge>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Challenge {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub token: String,
}

pub struct AcmeClient {
    http: reqwest::Client,
    directory_url: String,
    account_key: RsaPrivateKey,
    nonce: Mutex<Option<String>>,
    kid: Mutex<Option<String>>,
}

impl AcmeClient {
    pub fn new(staging: bool) -> Result<Self, AcmeError> {
        let account_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)?;
        Ok(Self {
            http: reqwest::Client::new(),
            directory_url: if staging {
                LETS_ENCRYPT_STAGING.to_string()
            } else {
                LETS_ENCRYPT_PRODUCTION.to_string()
            },
            account_key,
            nonce: Mutex::new(None),
            kid: Mutex::new(None),
        })
    }

    pub async fn directory(&self) -> Result<Directory, AcmeError> {
        let response = self.http.get(&self.directory_url).send().await?;
        self.capture_nonce(&response);
        Ok(response.json().await?)
    }

    async fn fresh_nonce(&self, directory: &Directory) -> Result<String, AcmeError> {
        if let Some(nonce) = self.nonce.lock().unwrap().take() {
            return Ok(nonce);
        }
        let response = self.http.head(&directory.new_nonce).send().await?;
        self.capture_nonce(&response);
        self.nonce
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AcmeError::Malformed("no Replay-Nonce header".to_string()))
    }

    fn capture_nonce(&self, response: &reqwest::Response) {
        if let Some(value) = response.headers().get("replay-nonce") {
            if let Ok(text) = value.to_str() {
                *self.nonce.lock().unwrap() = Some(text.to_string());
            }
        }
    }

    async fn post(
        &self,
        directory: &Directory,
        url: &str,
        payload: Option<&Value>,
    ) -> Result<reqwest::Response, AcmeError> {
        let nonce = self.fresh_nonce(directory).await?;
        let auth = match self.kid.lock().unwrap().clone() {
            Some(ref kid) => JwsAuth::Kid(kid),
            None => JwsAuth::Jwk,
        };
        let body = sign(&self.account_key, url, &nonce, payload, auth);
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/jose+json")
            .json(&body)
            .send()
            .await?;
        self.capture_nonce(&response);
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AcmeError::Rejected(format!("{status}: {text}")));
        }
        Ok(response)
    }

    /// Create (or reuse) the ACME account for `contact_email`, storing the
    /// returned `kid` for every subsequent request.
    pub async fn ensure_account(&self, directory: &Directory, contact_email: &str) -> Result<(), AcmeError> {
        let payload = json!({
            "termsOfServiceAgreed": true,
            "contact": [format!("mailto:{contact_email}")],
        });
        let response = self.post(directory, &directory.new_account, Some(&payload)).await?;
        let kid = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AcmeError::Malformed("account response missing Location".to_string()))?
            .to_string();
        *self.kid.lock().unwrap() = Some(kid);
        Ok(())
    }

    pub async fn new_order(&self, directory: &Directory, domains: &[String]) -> Result<(String, Order), AcmeError> {
        let identifiers: Vec<Value> = domains
            .iter()
            .map(|d| json!({ "type": "dns", "value": d }))
            .collect();
        let payload = json!({ "identifiers": identifiers });
        let response = self.post(directory, &directory.new_order, Some(&payload)).await?;
        let order_url = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let order: Order = response.json().await?;
        Ok((order_url, order))
    }

    pub async fn fetch_authorization(&self, directory: &Directory, url: &str) -> Result<Authorization, AcmeError> {
        let response = self.post(directory, url, None).await?;
        Ok(response.json().await?)
    }

    /// Key authorization string for an HTTP-01 challenge token, per RFC 8555 §8.1.
    pub fn key_authorization(&self, token: &str) -> String {
        format!("{token}.{}", crate::acme::jws::jwk_thumbprint(&self.account_key))
    }

    pub async fn respond_to_challenge(&self, directory: &Directory, challenge: &Challenge) -> Result<(), AcmeError> {
        self.post(directory, &challenge.url, Some(&json!({}))).await?;
        Ok(())
    }

    /// Poll `authorization_url` until it leaves the `pending` state.
    pub async fn poll_authorization(&self, directory: &Directory, authorization_url: &str) -> Result<(), AcmeError> {
        for attempt in 1..=10u32 {
            let auth = self.fetch_authorization(directory, authorization_url).await?;
            match auth.status.as_str() {
                "valid" => return Ok(()),
                "invalid" => return Err(AcmeError::AuthorizationFailed(authorization_url.to_string())),
                _ => tokio::time::sleep(calculate_backoff(attempt, 500, 5_000)).await,
            }
        }
        Err(AcmeError::AuthorizationFailed(authorization_url.to_string()))
    }

    pub async fn finalize(&self, directory: &Directory, finalize_url: &str, csr_der: &[u8]) -> Result<String, AcmeError> {
        use crate::acme::jws::b64url;
        let payload = json!({ "csr": b64url(csr_der) });
        self.post(directory, finalize_url, Some(&payload)).await?;

        for attempt in 1..=10u32 {
            let response = self.post(directory, finalize_url, None).await?;
            let order: Order = response.json().await?;
            match order.status.as_str() {
                "valid" => {
                    return order
                        .certificate
                        .ok_or_else(|| AcmeError::Malformed("valid order missing certificate url".to_string()))
                }
                "invalid" => return Err(AcmeError::OrderNotReady(finalize_url.to_string())),
                _ => tokio::time::sleep(calculate_backoff(attempt, 500, 5_000)).await,
            }
        }
        Err(AcmeError::OrderNotReady(finalize_url.to_string()))
    }

    pub async fn download_certificate(&self, directory: &Directory, certificate_url: &str) -> Result<String, AcmeError> {
        let response = self.post(directory, certificate_url, None).await?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_and_production_directories_differ() {
        let staging = AcmeClient::new(true).unwrap();
        let production = AcmeClient::new(false).unwrap();
        assert_ne!(staging.directory_url, production.directory_url);
    }

    #[test]
    fn key_authorization_embeds_token() {
        let client = AcmeClient::new(true).unwrap();
        let authz = client.key_authorization("token-123");
        assert!(authz.starts_with("token-123."));
    }
}
