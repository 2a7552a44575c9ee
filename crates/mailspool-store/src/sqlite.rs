//! SQLite implementation of the MailboxStore trait.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::MailboxStore;
use crate::types::{Flag, MessageHeader, MessageId, NewMessage};

/// SQLite-based mailbox.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteMailbox {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMailbox {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {e}")))?
    }
}

fn to_sql_id(id: MessageId) -> Result<i64> {
    i64::try_from(id.0).map_err(|_| StoreError::InvalidData(format!("message id {id} out of range")))
}

fn message_exists(conn: &Connection, id: i64) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM messages WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn load_flags(conn: &Connection, id: i64) -> Result<BTreeSet<Flag>> {
    let mut stmt = conn.prepare_cached("SELECT flag FROM message_flags WHERE message_id = ?1")?;
    let rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;

    let mut flags = BTreeSet::new();
    for row in rows {
        flags.insert(Flag::new(row?));
    }
    Ok(flags)
}

fn load_header(conn: &Connection, id: i64) -> Result<Option<MessageHeader>> {
    let row = conn
        .query_row(
            "SELECT headers, stamp, size FROM messages WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((headers, stamp, size)) = row else {
        return Ok(None);
    };

    Ok(Some(MessageHeader {
        id: MessageId(id as u64),
        headers,
        stamp,
        size: size as u64,
        flags: load_flags(conn, id)?,
    }))
}

fn deleted_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT message_id FROM message_flags WHERE flag = ?1 ORDER BY message_id",
    )?;
    let ids = stmt
        .query_map(params![Flag::DELETED.as_str()], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[async_trait]
impl MailboxStore for SqliteMailbox {
    async fn insert_message(&self, message: NewMessage) -> Result<MessageId> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO messages (stamp, size, headers, body) VALUES (?1, ?2, ?3, ?4)",
                params![
                    message.stamp,
                    message.size() as i64,
                    message.headers,
                    message.body
                ],
            )?;
            Ok(MessageId(conn.last_insert_rowid() as u64))
        })
        .await
    }

    async fn count_messages(&self, unread_only: bool) -> Result<u64> {
        self.run(move |conn| {
            let count: i64 = if unread_only {
                conn.query_row(
                    "SELECT COUNT(*) FROM messages m WHERE NOT EXISTS (
                        SELECT 1 FROM message_flags f WHERE f.message_id = m.id AND f.flag = ?1
                    )",
                    params![Flag::SEEN.as_str()],
                    |row| row.get(0),
                )?
            } else {
                conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?
            };
            Ok(count as u64)
        })
        .await
    }

    async fn fetch_headers(&self, ids: Option<&[MessageId]>) -> Result<Vec<MessageHeader>> {
        let wanted: Option<BTreeSet<MessageId>> = ids.map(|ids| ids.iter().copied().collect());

        self.run(move |conn| {
            let ids: Vec<i64> = match wanted {
                Some(wanted) => wanted
                    .into_iter()
                    .filter_map(|id| i64::try_from(id.0).ok())
                    .collect(),
                None => {
                    let mut stmt = conn.prepare_cached("SELECT id FROM messages ORDER BY id")?;
                    let ids = stmt
                        .query_map([], |row| row.get::<_, i64>(0))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    ids
                }
            };

            let mut headers = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(header) = load_header(conn, id)? {
                    headers.push(header);
                }
            }
            Ok(headers)
        })
        .await
    }

    async fn get_message_body(&self, id: MessageId) -> Result<String> {
        let sql_id = to_sql_id(id)?;
        self.run(move |conn| {
            conn.query_row(
                "SELECT body FROM messages WHERE id = ?1",
                params![sql_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or(StoreError::MessageNotFound(id))
        })
        .await
    }

    async fn set_flag(&self, id: MessageId, flag: &Flag, value: bool) -> Result<()> {
        let sql_id = to_sql_id(id)?;
        let flag = flag.clone();

        self.run(move |conn| {
            if !message_exists(conn, sql_id)? {
                return Err(StoreError::MessageNotFound(id));
            }

            if value {
                conn.execute(
                    "INSERT OR IGNORE INTO message_flags (message_id, flag) VALUES (?1, ?2)",
                    params![sql_id, flag.as_str()],
                )?;
            } else {
                conn.execute(
                    "DELETE FROM message_flags WHERE message_id = ?1 AND flag = ?2",
                    params![sql_id, flag.as_str()],
                )?;
            }
            Ok(())
        })
        .await
    }

    async fn get_flag(&self, id: MessageId, flag: &Flag) -> Result<bool> {
        let sql_id = to_sql_id(id)?;
        let flag = flag.clone();

        self.run(move |conn| {
            if !message_exists(conn, sql_id)? {
                return Err(StoreError::MessageNotFound(id));
            }
            let found = conn
                .query_row(
                    "SELECT 1 FROM message_flags WHERE message_id = ?1 AND flag = ?2",
                    params![sql_id, flag.as_str()],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn to_expunge(&self) -> Result<Vec<MessageId>> {
        self.run(|conn| {
            Ok(deleted_ids(conn)?
                .into_iter()
                .map(|id| MessageId(id as u64))
                .collect())
        })
        .await
    }

    async fn purge_deleted(&self) -> Result<Vec<MessageId>> {
        self.run(|conn| {
            let tx = conn.transaction()?;
            let doomed = deleted_ids(&tx)?;

            for id in &doomed {
                tx.execute("DELETE FROM message_flags WHERE message_id = ?1", params![id])?;
                tx.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
            }
            tx.commit()?;

            if !doomed.is_empty() {
                tracing::debug!(count = doomed.len(), "purged deleted messages");
            }
            Ok(doomed.into_iter().map(|id| MessageId(id as u64)).collect())
        })
        .await
    }

    async fn get_sync_state(&self) -> Result<Option<u64>> {
        self.run(|conn| {
            let position = conn
                .query_row("SELECT position FROM sync_state WHERE id = 0", [], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?;
            Ok(position.map(|p| p as u64))
        })
        .await
    }

    async fn set_sync_state(&self, position: u64) -> Result<()> {
        let position = i64::try_from(position)
            .map_err(|_| StoreError::InvalidData(format!("cursor {position} out of range")))?;

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO sync_state (id, position) VALUES (0, ?1)
                 ON CONFLICT(id) DO UPDATE SET position = excluded.position",
                params![position],
            )?;
            Ok(())
        })
        .await
    }
}
