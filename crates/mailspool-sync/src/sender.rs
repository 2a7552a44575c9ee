//! Producer side of the spool.

use std::sync::Arc;

use mailspool_crypto::CryptoBox;
use mailspool_log::CommandLog;

use crate::command::Command;
use crate::error::Result;

/// Seals commands and appends them to a user's log.
#[derive(Debug, Clone)]
pub struct CommandSender {
    crypto: Arc<CryptoBox>,
    log: CommandLog,
}

impl CommandSender {
    pub fn new(crypto: Arc<CryptoBox>, log: CommandLog) -> Self {
        Self { crypto, log }
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    /// Serialize, encrypt and append `command`.
    ///
    /// Returns the log position of the new record. Blocks on the append lock.
    pub fn send(&self, command: &Command) -> Result<u64> {
        let plaintext = command.serialize()?;
        let sealed = self.crypto.encrypt(&plaintext)?;
        let position = self.log.append(&sealed)?;

        tracing::debug!(op = command.op(), position, "command appended");
        Ok(position)
    }
}
