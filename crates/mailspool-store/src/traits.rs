//! MailboxStore trait: the interface the sync engine and the presentation
//! layer use to reach the local mailbox.
//!
//! The engine only ever calls these operations; nothing here is specific to a
//! mail-retrieval protocol.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Flag, MessageHeader, MessageId, NewMessage};

/// Async interface to a local mailbox.
///
/// Implementations must tolerate concurrent readers while the sync engine
/// writes; readers may observe the store between two applied commands.
#[async_trait]
pub trait MailboxStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────────

    /// Deposit a new message and return its id.
    async fn insert_message(&self, message: NewMessage) -> Result<MessageId>;

    /// Count messages, optionally only those without the `seen` flag.
    async fn count_messages(&self, unread_only: bool) -> Result<u64>;

    /// Fetch headers in ascending id order.
    ///
    /// With `Some(ids)`, only those messages are returned; unknown ids are
    /// skipped.
    async fn fetch_headers(&self, ids: Option<&[MessageId]>) -> Result<Vec<MessageHeader>>;

    /// Fetch a message body.
    async fn get_message_body(&self, id: MessageId) -> Result<String>;

    // ─────────────────────────────────────────────────────────────────────────
    // Flags
    // ─────────────────────────────────────────────────────────────────────────

    /// Set or clear one flag. Fails with `MessageNotFound` for unknown ids.
    async fn set_flag(&self, id: MessageId, flag: &Flag, value: bool) -> Result<()>;

    /// Query one flag. Fails with `MessageNotFound` for unknown ids.
    async fn get_flag(&self, id: MessageId, flag: &Flag) -> Result<bool>;

    /// Ids of messages currently marked deleted, ascending.
    async fn to_expunge(&self) -> Result<Vec<MessageId>>;

    /// Permanently remove every message marked deleted.
    ///
    /// Returns the removed ids; an already-clean mailbox returns an empty list.
    async fn purge_deleted(&self) -> Result<Vec<MessageId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Sync cursor
    // ─────────────────────────────────────────────────────────────────────────

    /// The persisted spool cursor, if one was ever written.
    async fn get_sync_state(&self) -> Result<Option<u64>>;

    /// Persist the spool cursor.
    async fn set_sync_state(&self, position: u64) -> Result<()>;
}
