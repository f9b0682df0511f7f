use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::{Engine, engine::general_purpose};
use http::StatusCode;
use http::header::ACCEPT;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::http_client::{HttpClient, HttpClientError};

/// Signature algorithms accepted with an RSA provider key.
const RSA_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    #[error("fetching provider data: `{0}`")]
    Transport(String),
    #[error("provider data request failed: Status code: `{0}`, Body: `{1}`")]
    UnsuccessfulResponse(u16, String),
    #[error("decoding provider data: `{0}`")]
    Decode(String),
    #[error("invalid provider public key: `{0}`")]
    InvalidKey(String),
    #[error("provider data request cancelled")]
    Cancelled,
}

impl From<HttpClientError> for DiscoveryError {
    fn from(err: HttpClientError) -> Self {
        match err {
            HttpClientError::Cancelled => DiscoveryError::Cancelled,
            e => DiscoveryError::Transport(e.to_string()),
        }
    }
}

/// Signing key material of an identity provider.
#[derive(Clone)]
pub struct ProviderKey {
    decoding_key: DecodingKey,
    algorithms: Vec<Algorithm>,
}

impl ProviderKey {
    pub fn new(decoding_key: DecodingKey, algorithms: Vec<Algorithm>) -> Self {
        Self {
            decoding_key,
            algorithms,
        }
    }

    /// Builds an RSA key from a PEM encoded public key.
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, DiscoveryError> {
        let decoding_key =
            DecodingKey::from_rsa_pem(pem).map_err(|e| DiscoveryError::InvalidKey(e.to_string()))?;
        Ok(Self::new(decoding_key, RSA_ALGORITHMS.to_vec()))
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }
}

impl std::fmt::Debug for ProviderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderKey")
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

/// Resolves the public signing key of the identity provider at `provider_url`.
pub trait KeyDiscovery {
    fn resolve_key(&self, provider_url: &str) -> Result<ProviderKey, DiscoveryError>;
}

/// Provider data published at the realm url.
#[derive(Debug, Deserialize)]
struct ProviderData {
    /// Base64 DER SubjectPublicKeyInfo.
    public_key: String,
}

/// Reads the provider's `public_key` from the JSON document served at its base url.
///
/// Keys are cached per url and the cache is shared between clones.
#[derive(Clone)]
pub struct HttpKeyDiscovery<C> {
    http_client: C,
    cache: Arc<Mutex<HashMap<String, ProviderKey>>>,
}

impl<C> HttpKeyDiscovery<C> {
    pub fn new(http_client: C) -> Self {
        Self {
            http_client,
            cache: Arc::default(),
        }
    }
}

impl<C> HttpKeyDiscovery<C>
where
    C: HttpClient,
{
    fn fetch(&self, provider_url: &str) -> Result<ProviderKey, DiscoveryError> {
        let request = http::Request::builder()
            .uri(provider_url)
            .method("GET")
            .header(ACCEPT, "application/json")
            .body(Vec::new())
            .map_err(|e| DiscoveryError::Transport(format!("invalid provider url: {e}")))?;

        let response = self.http_client.send(request)?;
        let body = response.body();
        if response.status() != StatusCode::OK {
            return Err(DiscoveryError::UnsuccessfulResponse(
                response.status().as_u16(),
                String::from_utf8_lossy(body).to_string(),
            ));
        }

        let data: ProviderData =
            serde_json::from_slice(body).map_err(|e| DiscoveryError::Decode(e.to_string()))?;
        ProviderKey::from_rsa_pem(public_key_pem(&data.public_key)?.as_bytes())
    }
}

impl<C> KeyDiscovery for HttpKeyDiscovery<C>
where
    C: HttpClient,
{
    fn resolve_key(&self, provider_url: &str) -> Result<ProviderKey, DiscoveryError> {
        if let Some(key) = self.cached(provider_url) {
            return Ok(key);
        }

        debug!("fetching signing key from {provider_url}");
        let key = self.fetch(provider_url)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(provider_url.to_string(), key.clone());
        }
        Ok(key)
    }
}

impl<C> HttpKeyDiscovery<C> {
    fn cached(&self, provider_url: &str) -> Option<ProviderKey> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(provider_url).cloned())
    }
}

/// Wraps a base64 DER public key into PEM armor with 64 column lines.
fn public_key_pem(der_b64: &str) -> Result<String, DiscoveryError> {
    let der = general_purpose::STANDARD
        .decode(der_b64.trim())
        .map_err(|e| DiscoveryError::InvalidKey(e.to_string()))?;
    let encoded = general_purpose::STANDARD.encode(der);

    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for line in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    Ok(pem)
}
