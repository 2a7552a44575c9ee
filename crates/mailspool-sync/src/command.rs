//! Mailbox commands carried through the spool.
//!
//! A command is a small mutation of the local mailbox. Commands are encoded
//! as CBOR maps with an `op` discriminator as the first key:
//!
//! ```text
//! { "op": "set_flag", "message_id": 7, "flag": "deleted", "value": true }
//! { "op": "expunge" }
//! ```

use mailspool_store::{Flag, MailboxStore, MessageId};
use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// A mailbox mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Set or clear one flag on one message.
    ///
    /// Setting `deleted` only marks the message; [`Command::Expunge`]
    /// removes it.
    SetFlag {
        message_id: MessageId,
        flag: Flag,
        value: bool,
    },

    /// Remove every message currently marked deleted.
    Expunge,
}

impl Command {
    pub fn set_flag(message_id: impl Into<MessageId>, flag: impl Into<Flag>, value: bool) -> Self {
        Command::SetFlag {
            message_id: message_id.into(),
            flag: flag.into(),
            value,
        }
    }

    /// Mark a message for removal by the next expunge.
    pub fn delete(message_id: impl Into<MessageId>) -> Self {
        Self::set_flag(message_id, Flag::DELETED, true)
    }

    /// Short name used in logs.
    pub fn op(&self) -> &'static str {
        match self {
            Command::SetFlag { .. } => "set_flag",
            Command::Expunge => "expunge",
        }
    }

    /// Encode to CBOR.
    pub fn serialize(&self) -> Result<Vec<u8>, CommandError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CommandError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CommandError> {
        ciborium::from_reader(bytes).map_err(|e| CommandError::Decode(e.to_string()))
    }

    /// Apply this command to a mailbox.
    ///
    /// Both commands are idempotent, so replaying an already-applied record
    /// leaves the mailbox unchanged.
    pub async fn apply<S>(&self, store: &S) -> Result<(), CommandError>
    where
        S: MailboxStore + ?Sized,
    {
        match self {
            Command::SetFlag {
                message_id,
                flag,
                value,
            } => {
                store.set_flag(*message_id, flag, *value).await?;
                tracing::debug!(%message_id, %flag, value, "flag updated");
            }
            Command::Expunge => {
                let purged = store.purge_deleted().await?;
                tracing::debug!(count = purged.len(), "expunged deleted messages");
            }
        }
        Ok(())
    }
}
