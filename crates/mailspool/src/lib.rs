//! # Mailspool
//!
//! An encrypted, per-user command spool between a mail client and its local
//! mailbox.
//!
//! ## Overview
//!
//! - **Commands**: flag changes and expunges, sealed with a key both ends
//!   derive from their X25519 keypairs
//! - **Spool**: an append-only log of opaque records, one per user
//! - **Sync**: a background worker that replays the spool into the local
//!   mailbox and remembers how far it got
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mailspool::{Account, AccountConfig};
//! use mailspool::crypto::KeyPair;
//! use mailspool::store::{Flag, MessageId, SqliteMailbox};
//!
//! async fn example() {
//!     let keys = KeyPair::generate();
//!     let server = KeyPair::generate().public_key();
//!     let store = Arc::new(SqliteMailbox::open("alice.db").unwrap());
//!
//!     let account = Account::open(AccountConfig::new("alice", "./spool"), &keys, &server, store)
//!         .unwrap();
//!
//!     account.set_flag(MessageId(7), Flag::DELETED, true).await.unwrap();
//!     account.expunge().await.unwrap();
//!
//!     let handle = account.start_sync();
//!     handle.trigger();
//!     handle.stop().await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `mailspool::crypto` - Keys and the crypto box
//! - `mailspool::log` - The spool log
//! - `mailspool::store` - Mailbox store trait and backends
//! - `mailspool::sync` - Commands and the sync engine

pub mod account;
pub mod error;

pub use mailspool_crypto as crypto;
pub use mailspool_log as log;
pub use mailspool_store as store;
pub use mailspool_sync as sync;

pub use account::{Account, AccountConfig};
pub use error::{MailspoolError, Result};

pub use mailspool_sync::{Command, EngineState, SyncConfig, SyncHandle, TickReport};
