//! Unseal run: status check, bundle fetch, decryption, threshold check and
//! the share submission loop.

use std::fmt;

use secrecy::ExposeSecret;
use tracing::{debug, info, instrument};

use crate::{
    error::{KeyError, UnsealError},
    key::ShareDecryptor,
    seal::{SealBackend, SealStatus},
    shares::ShareSet,
    store::{KvStore, ShareSource},
};

/// How a single unseal run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsealOutcome {
    /// Vault has not been initialized; nothing to do.
    NotInitialized,
    /// Vault was already unsealed; nothing to do.
    AlreadyUnsealed,
    /// Vault unsealed after `submitted` shares.
    Unsealed { submitted: usize },
    /// The bundle holds fewer shares than Vault requires; nothing was submitted.
    InsufficientShares { required: usize, provided: usize },
    /// Every share was submitted and Vault is still sealed.
    Exhausted {
        submitted: usize,
        progress: usize,
        threshold: usize,
    },
}

impl UnsealOutcome {
    /// `true` for the outcomes that end the process with exit code 0.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            UnsealOutcome::NotInitialized
                | UnsealOutcome::AlreadyUnsealed
                | UnsealOutcome::Unsealed { .. }
        )
    }
}

impl fmt::Display for UnsealOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsealOutcome::NotInitialized => f.write_str("Vault not initialized, exiting"),
            UnsealOutcome::AlreadyUnsealed => f.write_str("Vault already unsealed, exiting"),
            UnsealOutcome::Unsealed { submitted } => {
                write!(f, "Vault unsealed with {submitted} key share(s)")
            }
            UnsealOutcome::InsufficientShares { required, provided } => write!(
                f,
                "not enough key shares to unseal, required: {required}, provided: {provided}"
            ),
            UnsealOutcome::Exhausted {
                submitted,
                progress,
                threshold,
            } => write!(
                f,
                "used all {submitted} key shares but Vault is still sealed (progress {progress}/{threshold})"
            ),
        }
    }
}

/// Drives one unseal run against a [`SealBackend`], reading the share bundle
/// through a [`ShareSource`] and decrypting it with a [`ShareDecryptor`].
pub struct Unsealer<B, S, D> {
    backend: B,
    source: ShareSource<S>,
    decryptor: D,
    kv_path: String,
}

impl<B, S, D> Unsealer<B, S, D>
where
    B: SealBackend,
    S: KvStore,
    D: ShareDecryptor,
{
    pub fn new(backend: B, source: ShareSource<S>, decryptor: D, kv_path: impl Into<String>) -> Self {
        Self {
            backend,
            source,
            decryptor,
            kv_path: kv_path.into(),
        }
    }

    /// Runs one unseal pass: reads the seal status, and if Vault is initialized and sealed,
    /// fetches and decrypts the share bundle, checks it against the threshold and submits
    /// shares one at a time until Vault reports unsealed.
    /// Every step either succeeds once or ends the run; nothing is retried.
    /// # Returns
    /// The [`UnsealOutcome`] of the run. `NotInitialized`, `AlreadyUnsealed` and `Unsealed`
    /// are successes; `InsufficientShares` and `Exhausted` are fatal outcomes.
    /// # Errors
    /// Returns UnsealError::Status, UnsealError::Fetch, UnsealError::Decrypt or
    /// UnsealError::Submission naming the step that failed.
    #[instrument(name = "unseal", skip(self), fields(kv_path = %self.kv_path))]
    pub async fn run(&self) -> Result<UnsealOutcome, UnsealError> {
        let status = self
            .backend
            .seal_status()
            .await
            .map_err(UnsealError::Status)?;

        if !status.initialized {
            return Ok(UnsealOutcome::NotInitialized);
        }
        if !status.sealed {
            return Ok(UnsealOutcome::AlreadyUnsealed);
        }
        info!(
            threshold = status.threshold,
            progress = status.progress,
            "Vault is sealed, reading unseal keys"
        );

        let shares = self.load_shares().await?;
        if shares.len() < status.threshold {
            return Ok(UnsealOutcome::InsufficientShares {
                required: status.threshold,
                provided: shares.len(),
            });
        }

        self.submit(&shares, status).await
    }

    async fn load_shares(&self) -> Result<ShareSet, UnsealError> {
        let blob = self
            .source
            .fetch_encrypted_shares(&self.kv_path)
            .await
            .map_err(|source| UnsealError::Fetch {
                path: self.kv_path.clone(),
                source,
            })?;
        debug!(len = blob.len(), "Fetched encrypted share bundle");
        let plaintext = self
            .decryptor
            .decrypt_shares(blob.as_bytes())
            .await
            .map_err(UnsealError::Decrypt)?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| UnsealError::Decrypt(KeyError::Plaintext))?;
        let shares = ShareSet::parse(text);
        debug!(count = shares.len(), "Decrypted unseal key shares");
        Ok(shares)
    }

    /// Submit shares in order until Vault reports unsealed.
    /// Shares after the one that completes the unseal are never sent.
    async fn submit(
        &self,
        shares: &ShareSet,
        mut status: SealStatus,
    ) -> Result<UnsealOutcome, UnsealError> {
        let threshold = status.threshold;
        for (i, share) in shares.iter().enumerate() {
            let index = i + 1;
            status = self
                .backend
                .submit_unseal_share(share.expose_secret())
                .await
                .map_err(|source| UnsealError::Submission { index, source })?;
            debug!(
                share = index,
                progress = status.progress,
                threshold = status.threshold,
                "Submitted unseal key share"
            );
            if !status.sealed {
                return Ok(UnsealOutcome::Unsealed { submitted: index });
            }
        }
        Ok(UnsealOutcome::Exhausted {
            submitted: shares.len(),
            progress: status.progress,
            threshold,
        })
    }
}
