//! A mailbox that parks inside `set_flag` until the test lets it go.
//!
//! Lets tests hold the sync engine in the middle of applying a command and
//! observe what else can happen meanwhile.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mailspool_store::{Flag, MailboxStore, MemoryMailbox, MessageHeader, MessageId, NewMessage, Result};
use tokio::sync::Notify;

/// [`MemoryMailbox`] whose `set_flag` waits for [`GatedMailbox::release`].
#[derive(Default)]
pub struct GatedMailbox {
    inner: MemoryMailbox,
    entered: Notify,
    released: Notify,
    set_flag_calls: AtomicUsize,
}

impl GatedMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped mailbox, for checking results without passing the gate.
    pub fn inner(&self) -> &MemoryMailbox {
        &self.inner
    }

    /// Wait until a `set_flag` call is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked (or the next) `set_flag` call through.
    pub fn release(&self) {
        self.released.notify_one();
    }

    /// How many `set_flag` calls have reached the gate.
    pub fn set_flag_calls(&self) -> usize {
        self.set_flag_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailboxStore for GatedMailbox {
    async fn insert_message(&self, message: NewMessage) -> Result<MessageId> {
        self.inner.insert_message(message).await
    }

    async fn count_messages(&self, unread_only: bool) -> Result<u64> {
        self.inner.count_messages(unread_only).await
    }

    async fn fetch_headers(&self, ids: Option<&[MessageId]>) -> Result<Vec<MessageHeader>> {
        self.inner.fetch_headers(ids).await
    }

    async fn get_message_body(&self, id: MessageId) -> Result<String> {
        self.inner.get_message_body(id).await
    }

    async fn set_flag(&self, id: MessageId, flag: &Flag, value: bool) -> Result<()> {
        self.set_flag_calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.released.notified().await;
        self.inner.set_flag(id, flag, value).await
    }

    async fn get_flag(&self, id: MessageId, flag: &Flag) -> Result<bool> {
        self.inner.get_flag(id, flag).await
    }

    async fn to_expunge(&self) -> Result<Vec<MessageId>> {
        self.inner.to_expunge().await
    }

    async fn purge_deleted(&self) -> Result<Vec<MessageId>> {
        self.inner.purge_deleted().await
    }

    async fn get_sync_state(&self) -> Result<Option<u64>> {
        self.inner.get_sync_state().await
    }

    async fn set_sync_state(&self, position: u64) -> Result<()> {
        self.inner.set_sync_state(position).await
    }
}
