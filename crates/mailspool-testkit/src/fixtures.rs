//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a temporary spool, a fixed pair
//! of keys, and a seeded in-memory mailbox.

use std::fs::{File, OpenOptions};
use std::sync::Arc;

use mailspool_crypto::{CryptoBox, KeyPair};
use mailspool_log::{CommandLog, LogConfig, SpoolDir};
use mailspool_store::{MailboxStore, MemoryMailbox, MessageId, NewMessage};
use mailspool_sync::{CommandSender, SyncConfig, SyncEngine};
use nix::fcntl::{Flock, FlockArg};
use tempfile::TempDir;

/// Seed of the mail client's keypair.
pub const CLIENT_SEED: [u8; 32] = [0x11; 32];

/// Seed of the storage server's keypair.
pub const SERVER_SEED: [u8; 32] = [0x22; 32];

/// Build a message with a numbered subject.
pub fn sample_message(n: usize) -> NewMessage {
    NewMessage {
        headers: format!("From: sender{n}@example.org\r\nSubject: message {n}\r\n"),
        body: format!("This is message number {n}.\r\n"),
        stamp: 1_700_000_000 + n as i64,
    }
}

/// Install a test-writer subscriber at debug level. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Take the log's append lock as a writer would, creating the file if needed.
///
/// Bytes written through the returned handle look like an append in flight
/// until it is dropped.
pub fn hold_append_lock(log: &CommandLog) -> Flock<File> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log.path())
        .expect("failed to open log");
    Flock::lock(file, FlockArg::LockExclusive)
        .map_err(|(_, errno)| errno)
        .expect("failed to lock log")
}

/// One user's spool, keys and mailbox in a temporary directory.
pub struct TestFixture {
    pub dir: TempDir,
    pub spool: SpoolDir,
    pub user: String,
    pub client: KeyPair,
    pub server: KeyPair,
    pub store: Arc<MemoryMailbox>,
    /// Ids of the seeded messages, ascending.
    pub messages: Vec<MessageId>,
}

impl TestFixture {
    /// Create a fixture whose mailbox holds `count` messages.
    pub async fn new(user: &str, count: usize) -> Self {
        Self::with_config(user, count, LogConfig::default()).await
    }

    pub async fn with_config(user: &str, count: usize, config: LogConfig) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let spool = SpoolDir::new(dir.path().join("spool"), config);

        let store = Arc::new(MemoryMailbox::new());
        let mut messages = Vec::with_capacity(count);
        for n in 0..count {
            let id = store
                .insert_message(sample_message(n))
                .await
                .expect("failed to seed mailbox");
            messages.push(id);
        }

        Self {
            dir,
            spool,
            user: user.to_string(),
            client: KeyPair::from_seed(CLIENT_SEED),
            server: KeyPair::from_seed(SERVER_SEED),
            store,
            messages,
        }
    }

    /// The user's log.
    pub fn log(&self) -> CommandLog {
        self.spool.open(&self.user).expect("failed to open log")
    }

    /// Box held by the mail client (client secret, server public).
    pub fn client_box(&self) -> Arc<CryptoBox> {
        Arc::new(CryptoBox::new(
            &self.user,
            self.client.secret(),
            &self.server.public_key(),
        ))
    }

    /// Box held by the storage server (server secret, client public).
    pub fn server_box(&self) -> Arc<CryptoBox> {
        Arc::new(CryptoBox::new(
            &self.user,
            self.server.secret(),
            &self.client.public_key(),
        ))
    }

    /// Sender sealing with the server's box.
    pub fn sender(&self) -> CommandSender {
        CommandSender::new(self.server_box(), self.log())
    }

    /// Engine opening with the client's box.
    pub fn engine(&self, config: SyncConfig) -> SyncEngine<MemoryMailbox, CommandLog> {
        SyncEngine::new(
            self.user.clone(),
            self.store.clone(),
            Arc::new(self.log()),
            self.client_box(),
            config,
        )
    }

    /// Ids currently in the mailbox.
    pub async fn remaining(&self) -> Vec<MessageId> {
        self.store
            .fetch_headers(None)
            .await
            .expect("failed to fetch headers")
            .into_iter()
            .map(|h| h.id)
            .collect()
    }
}
