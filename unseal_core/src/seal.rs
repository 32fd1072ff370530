//! Vault seal status and unseal submission.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::SealError;

/// Seal status as reported by `sys/seal-status` and `sys/unseal`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SealStatus {
    pub initialized: bool,
    pub sealed: bool,
    /// Number of shares required to unseal
    #[serde(rename = "t")]
    pub threshold: usize,
    /// Shares accepted so far towards the current unseal attempt
    #[serde(default)]
    pub progress: usize,
    /// Total number of shares the master key was split into
    #[serde(rename = "n", default)]
    pub shares: usize,
    #[serde(rename = "type")]
    pub seal_type: Option<String>,
    pub version: Option<String>,
}

impl SealStatus {
    pub fn new(initialized: bool, sealed: bool, threshold: usize, progress: usize) -> Self {
        Self {
            initialized,
            sealed,
            threshold,
            progress,
            shares: 0,
            seal_type: None,
            version: None,
        }
    }
}

/// The two Vault operations an unseal run needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SealBackend: Send + Sync {
    async fn seal_status(&self) -> Result<SealStatus, SealError>;
    /// Submit a single key share and return the resulting status.
    async fn submit_unseal_share(&self, share: &str) -> Result<SealStatus, SealError>;
}

#[derive(Serialize)]
struct UnsealRequest<'a> {
    key: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// HTTP client for Vault's `sys` seal endpoints.
/// Wraps a shared `reqwest::Client` (built once, with the run's timeout) and the Vault base address.
/// # Operations
/// * `seal_status` – `GET /v1/sys/seal-status`
/// * `submit_unseal_share` – `PUT /v1/sys/unseal` with `{"key": "<share>"}`
/// # Errors
/// Both return SealError::Transport when Vault cannot be reached or answers with an
/// unreadable body, and SealError::Server carrying Vault's `errors` for non-2xx answers.
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: Client,
    addr: String,
}

impl VaultClient {
    pub const DEFAULT_ADDR: &'static str = "https://127.0.0.1:8200";

    /// `addr` is the Vault base address, e.g. `https://vault.service.consul:8200`.
    pub fn new(http: Client, addr: impl Into<String>) -> Self {
        let addr = addr.into().trim_end_matches('/').to_owned();
        Self { http, addr }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/sys/{}", self.addr, path)
    }
}

#[async_trait]
impl SealBackend for VaultClient {
    #[instrument(level = "debug", skip(self), fields(addr = %self.addr))]
    async fn seal_status(&self) -> Result<SealStatus, SealError> {
        let response = self.http.get(self.url("seal-status")).send().await?;
        read_status(response).await
    }

    #[instrument(level = "debug", skip(self, share), fields(addr = %self.addr))]
    async fn submit_unseal_share(&self, share: &str) -> Result<SealStatus, SealError> {
        let response = self
            .http
            .put(self.url("unseal"))
            .json(&UnsealRequest { key: share })
            .send()
            .await?;
        read_status(response).await
    }
}

/// Vault reports failures as `{"errors": [...]}`; fall back to the status line otherwise.
async fn read_status(response: Response) -> Result<SealStatus, SealError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .map(|b| b.errors.join("; "))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| status.to_string());
        return Err(SealError::Server {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}
