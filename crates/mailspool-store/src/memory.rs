//! In-memory implementation of the MailboxStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::traits::MailboxStore;
use crate::types::{Flag, MessageHeader, MessageId, NewMessage};

/// In-memory mailbox.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryMailbox {
    inner: RwLock<MemoryMailboxInner>,
}

struct MemoryMailboxInner {
    /// Messages indexed by id; BTreeMap keeps fetches in id order.
    messages: BTreeMap<MessageId, StoredMessage>,

    next_id: u64,

    sync_state: Option<u64>,

    /// Number of times `purge_deleted` ran.
    purge_calls: u64,
}

struct StoredMessage {
    message: NewMessage,
    flags: BTreeSet<Flag>,
}

impl MemoryMailbox {
    /// Create a new empty in-memory mailbox.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryMailboxInner {
                messages: BTreeMap::new(),
                next_id: 1,
                sync_state: None,
                purge_calls: 0,
            }),
        }
    }

    /// How many times the purge path was invoked.
    pub fn purge_count(&self) -> u64 {
        self.read().map(|inner| inner.purge_calls).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryMailboxInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryMailboxInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryMailbox {
    fn default() -> Self {
        Self::new()
    }
}

fn header_of(id: MessageId, stored: &StoredMessage) -> MessageHeader {
    MessageHeader {
        id,
        headers: stored.message.headers.clone(),
        stamp: stored.message.stamp,
        size: stored.message.size(),
        flags: stored.flags.clone(),
    }
}

#[async_trait]
impl MailboxStore for MemoryMailbox {
    async fn insert_message(&self, message: NewMessage) -> Result<MessageId> {
        let mut inner = self.write()?;
        let id = MessageId(inner.next_id);
        inner.next_id += 1;
        inner.messages.insert(
            id,
            StoredMessage {
                message,
                flags: BTreeSet::new(),
            },
        );
        Ok(id)
    }

    async fn count_messages(&self, unread_only: bool) -> Result<u64> {
        let inner = self.read()?;
        let count = inner
            .messages
            .values()
            .filter(|m| !unread_only || !m.flags.contains(&Flag::SEEN))
            .count();
        Ok(count as u64)
    }

    async fn fetch_headers(&self, ids: Option<&[MessageId]>) -> Result<Vec<MessageHeader>> {
        let inner = self.read()?;

        let headers = match ids {
            None => inner
                .messages
                .iter()
                .map(|(id, stored)| header_of(*id, stored))
                .collect(),
            Some(ids) => {
                let wanted: BTreeSet<MessageId> = ids.iter().copied().collect();
                wanted
                    .into_iter()
                    .filter_map(|id| inner.messages.get(&id).map(|stored| header_of(id, stored)))
                    .collect()
            }
        };

        Ok(headers)
    }

    async fn get_message_body(&self, id: MessageId) -> Result<String> {
        let inner = self.read()?;
        inner
            .messages
            .get(&id)
            .map(|stored| stored.message.body.clone())
            .ok_or(StoreError::MessageNotFound(id))
    }

    async fn set_flag(&self, id: MessageId, flag: &Flag, value: bool) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .messages
            .get_mut(&id)
            .ok_or(StoreError::MessageNotFound(id))?;

        if value {
            stored.flags.insert(flag.clone());
        } else {
            stored.flags.remove(flag);
        }
        Ok(())
    }

    async fn get_flag(&self, id: MessageId, flag: &Flag) -> Result<bool> {
        let inner = self.read()?;
        inner
            .messages
            .get(&id)
            .map(|stored| stored.flags.contains(flag))
            .ok_or(StoreError::MessageNotFound(id))
    }

    async fn to_expunge(&self) -> Result<Vec<MessageId>> {
        let inner = self.read()?;
        Ok(inner
            .messages
            .iter()
            .filter(|(_, stored)| stored.flags.contains(&Flag::DELETED))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn purge_deleted(&self) -> Result<Vec<MessageId>> {
        let mut inner = self.write()?;
        inner.purge_calls += 1;

        let doomed: Vec<MessageId> = inner
            .messages
            .iter()
            .filter(|(_, stored)| stored.flags.contains(&Flag::DELETED))
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            inner.messages.remove(id);
        }
        Ok(doomed)
    }

    async fn get_sync_state(&self) -> Result<Option<u64>> {
        Ok(self.read()?.sync_state)
    }

    async fn set_sync_state(&self, position: u64) -> Result<()> {
        self.write()?.sync_state = Some(position);
        Ok(())
    }
}
