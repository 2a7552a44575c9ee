//! Error types for the crypto module.

use thiserror::Error;

/// Errors that can occur while sealing or opening records.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The ciphertext failed the authenticity check: wrong key pairing or tampered bytes.
    #[error("authentication failed: ciphertext was not sealed for this channel")]
    Authentication,

    /// The ciphertext is too short to contain a nonce and tag.
    #[error("ciphertext truncated: {len} bytes, need at least {min}")]
    Truncated { len: usize, min: usize },

    /// Encryption error.
    #[error("encryption error")]
    Encryption,

    /// Key material has the wrong length or does not match.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Key file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
