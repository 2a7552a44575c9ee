//! # Mailspool Sync
//!
//! Encrypted mailbox commands and the worker that replays them.
//!
//! ## Overview
//!
//! The presentation layer turns user actions (flagging, deleting,
//! expunging) into [`Command`]s and hands them to a [`CommandSender`], which
//! seals them and appends them to the user's spool. A [`SyncEngine`] on the
//! other side scans the spool from its persisted cursor, opens each record
//! and applies it to the local [`MailboxStore`](mailspool_store::MailboxStore).
//!
//! ## Key Properties
//!
//! - **Ordered**: records apply strictly in log order within a tick
//! - **Resumable**: the cursor is persisted after every tick
//! - **Skip, don't stall**: a record that cannot be opened, decoded or
//!   applied is logged and passed over
//! - **Never past corruption**: a framing error holds the cursor at the bad
//!   frame until the log is repaired
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mailspool_crypto::{CryptoBox, KeyPair};
//! use mailspool_log::{LogConfig, SpoolDir};
//! use mailspool_store::MemoryMailbox;
//! use mailspool_sync::{Command, CommandSender, SyncConfig, SyncEngine};
//!
//! async fn example() {
//!     let client = KeyPair::generate();
//!     let server = KeyPair::generate();
//!     let crypto = Arc::new(CryptoBox::new("alice", client.secret(), &server.public_key()));
//!
//!     let log = SpoolDir::new("./spool", LogConfig::default()).open("alice").unwrap();
//!     let sender = CommandSender::new(crypto.clone(), log.clone());
//!     sender.send(&Command::Expunge).unwrap();
//!
//!     let store = Arc::new(MemoryMailbox::new());
//!     let engine = SyncEngine::new("alice", store, Arc::new(log), crypto, SyncConfig::default());
//!     let report = engine.tick().await;
//!     println!("applied {}", report.applied);
//! }
//! ```

pub mod command;
pub mod engine;
pub mod error;
pub mod sender;

pub use command::Command;
pub use engine::{EngineState, SyncConfig, SyncEngine, SyncHandle, TickReport, DEFAULT_PERIOD};
pub use error::{CommandError, Result, SyncError};
pub use sender::CommandSender;
