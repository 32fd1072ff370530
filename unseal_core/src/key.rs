//! RSA key handling for the encrypted share bundle.
//! - Loads a PEM-encoded PKCS#1 private key from bytes or from disk
//! - Decrypts the bundle with PKCS#1 v1.5 padding (blinded with the OS RNG)
//! - Exposes the [`ShareDecryptor`] seam the orchestrator depends on

use std::{
    fmt,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use rand::rngs::OsRng;
use rsa::{
    Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey, pkcs1::DecodeRsaPrivateKey, traits::PublicKeyParts,
};
use tracing::instrument;
use zeroize::Zeroizing;

use crate::error::KeyError;

/// Generic interface for turning the encrypted bundle into plaintext share material.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShareDecryptor: Send + Sync {
    /// Decrypt the raw (already base64-decoded) bundle.
    async fn decrypt_shares(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError>;
}

/// RSA private key protecting the unseal key shares.
/// The inner key zeroizes itself on drop and never shows up in `Debug` output.
#[derive(Clone)]
pub struct ShareKey {
    inner: RsaPrivateKey,
}

impl ShareKey {
    /// Parse a PEM-encoded PKCS#1 (`RSA PRIVATE KEY`) document.
    /// Whitespace around the document is ignored; any other label is rejected.
    pub fn from_pem(pem: &[u8]) -> Result<Self, KeyError> {
        let text = std::str::from_utf8(pem)
            .map_err(|_| KeyError::Format("key is not PEM text".to_owned()))?;
        let inner = RsaPrivateKey::from_pkcs1_pem(text.trim())
            .map_err(|e| KeyError::Format(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Read and parse the key file at `path`.
    #[instrument(level = "debug")]
    pub async fn from_file(path: &Path) -> Result<Self, KeyError> {
        let raw = tokio::fs::read(path).await.map_err(|source| KeyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(&Zeroizing::new(raw))
    }

    /// Public half of the key pair.
    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }

    /// Decrypts a PKCS#1 v1.5 ciphertext with this key, blinding the operation with the OS RNG.
    /// The plaintext buffer is wiped when dropped.
    /// # Parameters
    /// * ciphertext – Raw RSA ciphertext, exactly one modulus long.
    /// # Returns
    /// The decrypted bytes in a zeroizing buffer.
    /// # Errors
    /// Returns KeyError::Decrypt if the ciphertext has the wrong length or the padding
    /// does not check out; no partial plaintext is ever returned.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let plaintext = self
            .inner
            .decrypt_blinded(&mut OsRng, Pkcs1v15Encrypt, ciphertext)?;
        Ok(Zeroizing::new(plaintext))
    }
}

impl fmt::Debug for ShareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareKey")
            .field("bits", &(self.inner.size() * 8))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ShareDecryptor for ShareKey {
    async fn decrypt_shares(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        self.decrypt(blob)
    }
}

/// Key file that is only read when a decryption is actually needed,
/// so a run against an unsealed Vault never touches the credential.
#[derive(Debug, Clone)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ShareDecryptor for KeyFile {
    #[instrument(level = "debug", skip(self, blob), fields(path = %self.path().display(), len = blob.len()))]
    async fn decrypt_shares(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        ShareKey::from_file(self.path()).await?.decrypt(blob)
    }
}
