//! # Mailspool Store
//!
//! The local mailbox the sync engine applies commands to. Provides a
//! trait-based interface with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`MailboxStore`] - The async trait for all mailbox operations
//! - [`SqliteMailbox`] - SQLite-based persistent storage
//! - [`MemoryMailbox`] - In-memory storage for tests
//! - [`Flag`], [`MessageId`], [`MessageHeader`] - Mailbox values
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mailspool_store::{Flag, MailboxStore, NewMessage, SqliteMailbox};
//!
//! async fn example() {
//!     let store = SqliteMailbox::open("mailbox.db").unwrap();
//!
//!     let id = store
//!         .insert_message(NewMessage {
//!             headers: "Subject: hello\r\n".into(),
//!             body: "hi".into(),
//!             stamp: 0,
//!         })
//!         .await
//!         .unwrap();
//!     store.set_flag(id, &Flag::SEEN, true).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Flags are sets**: setting a flag twice is a no-op
//! - **Cursor**: the last applied spool position lives in the same database
//!   as the messages it describes

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::{Result, StoreError};
pub use memory::MemoryMailbox;
pub use sqlite::SqliteMailbox;
pub use traits::MailboxStore;
pub use types::{Flag, MessageHeader, MessageId, NewMessage};
