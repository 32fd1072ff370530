//! Encrypted share bundle retrieval from Consul KV.
//!
//! The bundle is stored as base64 text. Consul itself wraps every value in its
//! own base64 transport encoding inside the JSON response, so a stored bundle
//! is decoded twice on the way out: once by [`ConsulKv`], once by [`ShareSource`].

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use crate::error::StoreError;

/// Key-value lookup used to fetch the stored bundle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Raw stored value at `path`, or `None` when the key is absent or empty.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// RSA ciphertext of the comma-separated share bundle.
pub struct EncryptedShareBlob(Vec<u8>);

impl std::fmt::Debug for EncryptedShareBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedShareBlob")
            .field("len", &self.0.len())
            .finish()
    }
}

impl EncryptedShareBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reads the base64-encoded bundle out of a [`KvStore`].
#[derive(Debug, Clone)]
pub struct ShareSource<S> {
    store: S,
}

impl<S: KvStore> ShareSource<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reads the encrypted share bundle stored at `path` and decodes it from standard base64.
    /// Line breaks in the stored text are ignored; no retry is attempted on any failure.
    /// # Parameters
    /// * path – Key-value path of the bundle, e.g. `vaultinit/keys`.
    /// # Returns
    /// The raw RSA ciphertext as an [`EncryptedShareBlob`].
    /// # Errors
    /// Returns StoreError::NotFound if the key is absent or empty,
    /// StoreError::Transport or StoreError::Server if the store cannot be read,
    /// and StoreError::Decode if the stored text is not valid base64.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_encrypted_shares(&self, path: &str) -> Result<EncryptedShareBlob, StoreError> {
        let stored = self
            .store
            .get(path)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_owned(),
            })?;
        let text: Vec<u8> = stored
            .into_iter()
            .filter(|b| !matches!(*b, b'\r' | b'\n'))
            .collect();
        let blob = STANDARD.decode(&text).map_err(|source| StoreError::Decode {
            path: path.to_owned(),
            source,
        })?;
        tracing::debug!(len = blob.len(), "Decoded encrypted share bundle");
        Ok(EncryptedShareBlob(blob))
    }
}

#[derive(Deserialize)]
struct KvPair {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: Option<String>,
}

/// HTTP client for Consul's `/v1/kv` endpoint
#[derive(Clone)]
pub struct ConsulKv {
    http: Client,
    base: String,
    token: Option<SecretString>,
}

impl ConsulKv {
    pub const DEFAULT_ADDR: &'static str = "127.0.0.1:8500";
    pub const DEFAULT_SCHEME: &'static str = "http";

    /// `addr` is `host:port` without a scheme, matching `CONSUL_HTTP_ADDR`.
    pub fn new(http: Client, scheme: &str, addr: &str) -> Self {
        let base = format!("{}://{}", scheme, addr.trim_end_matches('/'));
        Self {
            http,
            base,
            token: None,
        }
    }

    /// ACL token sent as `X-Consul-Token`.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/kv/{}", self.base, path.trim_start_matches('/'))
    }
}

impl std::fmt::Debug for ConsulKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsulKv")
            .field("base", &self.base)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl KvStore for ConsulKv {
    #[instrument(level = "debug", skip(self), fields(base = %self.base))]
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut request = self.http.get(self.url(path));
        if let Some(token) = &self.token {
            request = request.header("X-Consul-Token", token.expose_secret());
        }
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match body.trim() {
                "" => status.to_string(),
                text => text.to_owned(),
            };
            return Err(StoreError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let pairs: Vec<KvPair> = response.json().await?;
        let wanted = path.trim_start_matches('/');
        let Some(value) = pairs
            .into_iter()
            .find(|pair| pair.key == wanted)
            .and_then(|pair| pair.value)
        else {
            return Ok(None);
        };
        // Consul's own transport encoding; a bad value here is a server fault.
        let raw = STANDARD
            .decode(value)
            .map_err(|e| StoreError::Server {
                status: status.as_u16(),
                message: format!("invalid base64 in Value of key {wanted}: {e}"),
            })?;
        Ok(Some(raw).filter(|raw| !raw.is_empty()))
    }
}
