//! # Mailspool Testkit
//!
//! Testing utilities for Mailspool.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a temporary spool with fixed client and server keys and a
//!   seeded mailbox
//! - **Gated mailbox**: a store that parks the engine mid-apply
//! - **Generators**: Proptest strategies for commands, flags and keys
//! - **Golden vectors**: fixed command and frame encodings
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use mailspool_testkit::TestFixture;
//! use mailspool_sync::{Command, SyncConfig};
//!
//! let fixture = TestFixture::new("alice", 3).await;
//! fixture.sender().send(&Command::delete(fixture.messages[0]))?;
//! let report = fixture.engine(SyncConfig::default()).tick().await;
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use mailspool_testkit::generators::command;
//!
//! proptest! {
//!     #[test]
//!     fn encoding_is_stable(cmd in command()) {
//!         prop_assert_eq!(cmd.serialize().unwrap(), cmd.serialize().unwrap());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod gated;
pub mod generators;
pub mod vectors;

pub use fixtures::{hold_append_lock, init_tracing, sample_message, TestFixture, CLIENT_SEED, SERVER_SEED};
pub use gated::GatedMailbox;
