//! Decrypted unseal key shares.

use std::fmt;

use secrecy::SecretString;

/// Separator between shares inside the decrypted bundle.
pub const SHARE_DELIMITER: char = ',';

/// Ordered unseal key shares, in the order they appear in the bundle.
/// Shares are interchangeable for Vault, but the submission order is stable within a run.
pub struct ShareSet {
    shares: Vec<SecretString>,
}

impl ShareSet {
    /// Split the decrypted bundle on [`SHARE_DELIMITER`].
    /// Tokens are trimmed and empty tokens (trailing comma or newline) are dropped.
    pub fn parse(plaintext: &str) -> Self {
        let shares = plaintext
            .split(SHARE_DELIMITER)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| SecretString::from(token.to_owned()))
            .collect();
        Self { shares }
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecretString> {
        self.shares.iter()
    }
}

impl fmt::Debug for ShareSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareSet")
            .field("len", &self.shares.len())
            .finish()
    }
}
