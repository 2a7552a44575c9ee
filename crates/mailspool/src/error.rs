//! Error types for Mailspool.

use mailspool_crypto::CryptoError;
use mailspool_log::LogError;
use mailspool_store::StoreError;
use mailspool_sync::{CommandError, SyncError};
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum MailspoolError {
    /// Key material error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Spool error.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// Mailbox error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Command error.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Blocking task failed.
    #[error("task error: {0}")]
    Task(String),
}

/// Result type for account operations.
pub type Result<T> = std::result::Result<T, MailspoolError>;
