//! Error types for the log module.

use thiserror::Error;

/// Errors that can occur during log operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// I/O error opening, reading or writing the log file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame at `position` is malformed or truncated.
    #[error("framing error at position {position}: {reason}")]
    Framing { position: u64, reason: String },

    /// Record does not fit in a 4-byte signed length prefix.
    #[error("record too large: {len} bytes")]
    RecordTooLarge { len: usize },

    /// User name cannot be used as a spool directory.
    #[error("invalid user name: {0:?}")]
    InvalidUser(String),

    /// Could not take the exclusive append lock.
    #[error("failed to lock log: {0}")]
    Lock(#[from] nix::errno::Errno),

    /// The in-process append guard was poisoned by a panicking writer.
    #[error("append guard poisoned")]
    Poisoned,

    /// Blocking task failed.
    #[error("task error: {0}")]
    Task(String),
}

impl LogError {
    /// True for errors that mean the log contents themselves are bad.
    pub fn is_framing(&self) -> bool {
        matches!(self, LogError::Framing { .. })
    }
}

/// Result type for log operations.
pub type Result<T> = std::result::Result<T, LogError>;
