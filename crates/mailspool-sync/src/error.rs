//! Error types for the sync module.

use mailspool_store::StoreError;
use thiserror::Error;

/// Errors from encoding, decoding or applying a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to decode command: {0}")]
    Decode(String),

    #[error("failed to encode command: {0}")]
    Encode(String),

    /// The store rejected the command.
    #[error("failed to apply command: {0}")]
    Apply(#[from] StoreError),
}

/// Errors that can occur while sending or synchronising commands.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading or appending to the spool failed.
    #[error("log error: {0}")]
    Log(#[from] mailspool_log::LogError),

    /// Sealing or opening a record failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] mailspool_crypto::CryptoError),

    /// A command could not be encoded, decoded or applied.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// The local mailbox failed outside of applying a command.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The background worker panicked or was cancelled.
    #[error("sync worker failed: {0}")]
    Worker(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
