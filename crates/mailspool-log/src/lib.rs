//! # Mailspool Log
//!
//! The spool: a per-user, append-only log of opaque ciphertext records.
//!
//! ## Overview
//!
//! Each record is framed as a 4-byte signed little-endian length followed by
//! the payload. [`CommandLog::append`] returns the byte offset where the frame
//! begins; [`CommandLog::scan`] reads forward from any offset and ends with a
//! sentinel carrying the offset to resume from.
//!
//! ## Key Types
//!
//! - [`CommandLog`] - One user's log file
//! - [`SpoolDir`] - The directory holding every user's log
//! - [`Scan`] / [`ScanItem`] - Lazy forward scan
//! - [`SpoolReader`] - Async seam the sync engine reads through
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mailspool_log::{LogConfig, ScanItem, SpoolDir};
//!
//! let spool = SpoolDir::new("./spool", LogConfig::default());
//! let log = spool.open("alice").unwrap();
//!
//! let position = log.append(b"ciphertext").unwrap();
//! for item in log.scan(position).unwrap() {
//!     match item.unwrap() {
//!         ScanItem::Record(entry) => println!("record at {}", entry.position),
//!         ScanItem::End(next) => println!("resume from {}", next),
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Single writer**: appends take an exclusive `flock` plus an in-process guard
//! - **Lock-free readers**: scans never wait on a lock and may see a frame mid-write
//! - **Rollback on failure**: an append that fails truncates its partial frame
//! - **Explicit tail policy**: [`ShortReadPolicy`] decides whether a partial
//!   frame is an append in flight or corruption; a partial frame no writer
//!   holds the lock for is always torn

pub mod error;
pub mod frame;
pub mod log;
pub mod reader;
pub mod spool;

pub use error::{LogError, Result};
pub use log::{CommandLog, LogConfig, LogEntry, Scan, ScanItem, ScanRecord, ShortReadPolicy};
pub use reader::{ScanBatch, ScanEnd, SpoolReader};
pub use spool::{SpoolDir, LOG_FILE_NAME};
