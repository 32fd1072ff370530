//! # Unseal Core
//! This crate implements the flows needed to unseal a Vault server from key shares
//! kept encrypted in Consul:
//! - Seal status inspection and unseal share submission against Vault's HTTP API
//! - Encrypted share bundle retrieval from Consul KV (base64 at rest)
//! - RSA (PKCS#1 v1.5) decryption of the bundle with a PEM-encoded PKCS#1 key
//! - The unseal run itself: threshold validation and the submission loop
//!
//! Each external collaborator sits behind a trait ([`SealBackend`], [`KvStore`],
//! [`ShareDecryptor`]) so the run can be driven against any implementation.

pub mod error;
pub mod key;
pub mod seal;
pub mod shares;
pub mod store;
pub mod unseal;

pub use error::{ErrorClass, KeyError, SealError, StoreError, UnsealError};
pub use key::{KeyFile, ShareDecryptor, ShareKey};
pub use seal::{SealBackend, SealStatus, VaultClient};
pub use shares::{SHARE_DELIMITER, ShareSet};
pub use store::{ConsulKv, EncryptedShareBlob, KvStore, ShareSource};
pub use unseal::{UnsealOutcome, Unsealer};
