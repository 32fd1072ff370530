//! Error types for each step of an unseal run.
//!
//! Every component owns a small error enum; [`UnsealError`] lifts them into
//! the step that failed so the final log line names both the step and the cause.

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Errors for loading the RSA key and decrypting the share bundle
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse RSA key: {0}")]
    Format(String),
    #[error("failed to decrypt text with RSA key: {0}")]
    Decrypt(#[from] rsa::Error),
    #[error("decrypted share bundle is not valid UTF-8")]
    Plaintext,
}

/// Errors for reading the encrypted share bundle out of the key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key {path} not found")]
    NotFound { path: String },
    #[error("key-value store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("key-value store answered {status}: {message}")]
    Server { status: u16, message: String },
    #[error("failed to decode base64 value of key {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// Errors for talking to Vault's seal endpoints
#[derive(Debug, Error)]
pub enum SealError {
    #[error("Vault request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Vault answered {status}: {message}")]
    Server { status: u16, message: String },
}

/// A fatal failure of one unseal run, tagged with the step that failed.
#[derive(Debug, Error)]
pub enum UnsealError {
    #[error("unable to get seal status")]
    Status(#[source] SealError),
    #[error("failed to read unseal keys from {path}")]
    Fetch {
        path: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to decrypt unseal keys")]
    Decrypt(#[source] KeyError),
    #[error("failed to unseal Vault with key share #{index}")]
    Submission {
        index: usize,
        #[source]
        source: SealError,
    },
}

/// Coarse classification used in the fatal log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Connection,
    Configuration,
    Decryption,
    Submission,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Connection => "connection",
            ErrorClass::Configuration => "configuration",
            ErrorClass::Decryption => "decryption",
            ErrorClass::Submission => "submission",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UnsealError {
    pub fn class(&self) -> ErrorClass {
        match self {
            UnsealError::Status(_) => ErrorClass::Connection,
            UnsealError::Fetch { source, .. } => match source {
                StoreError::Transport(_) | StoreError::Server { .. } => ErrorClass::Connection,
                StoreError::NotFound { .. } | StoreError::Decode { .. } => {
                    ErrorClass::Configuration
                }
            },
            UnsealError::Decrypt(source) => match source {
                KeyError::Read { .. } | KeyError::Format(_) => ErrorClass::Configuration,
                KeyError::Decrypt(_) | KeyError::Plaintext => ErrorClass::Decryption,
            },
            UnsealError::Submission { .. } => ErrorClass::Submission,
        }
    }
}
