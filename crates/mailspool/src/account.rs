//! The Account: one user's spool, keys, and mailbox wired together.
//!
//! The presentation layer never mutates the mailbox directly. Flag changes
//! and expunges are sent as commands into the spool, and the sync engine
//! applies them when it next reads the spool.

use std::path::PathBuf;
use std::sync::Arc;

use mailspool_crypto::{CryptoBox, KeyPair, PublicKey};
use mailspool_log::{CommandLog, LogConfig, SpoolDir};
use mailspool_store::{Flag, MailboxStore, MessageId};
use mailspool_sync::{Command, CommandSender, SyncConfig, SyncEngine, SyncHandle, TickReport};
use tokio::sync::Mutex;

use crate::error::{MailspoolError, Result};

/// Configuration for an account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// User name; also the spool subdirectory and the channel name.
    pub user: String,
    /// Directory holding every user's spool.
    pub spool_root: PathBuf,
    /// Log configuration.
    pub log: LogConfig,
    /// Sync configuration.
    pub sync: SyncConfig,
}

impl AccountConfig {
    pub fn new(user: impl Into<String>, spool_root: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            spool_root: spool_root.into(),
            log: LogConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// One user's account.
///
/// Holds a single [`CryptoBox`] between the local keypair and the peer's
/// public key. The channel key is symmetric, so the same box seals outgoing
/// commands and opens scanned ones.
///
/// Every engine the account builds shares one tick lock, so
/// [`Account::sync_once`] and a worker from [`Account::start_sync`] never
/// apply the spool at the same time.
pub struct Account<S: MailboxStore + ?Sized> {
    config: AccountConfig,
    crypto: Arc<CryptoBox>,
    sender: CommandSender,
    store: Arc<S>,
    tick_lock: Arc<Mutex<()>>,
}

impl<S: MailboxStore + ?Sized + 'static> Account<S> {
    /// Open the account, creating its spool directory if needed.
    pub fn open(config: AccountConfig, keys: &KeyPair, peer: &PublicKey, store: Arc<S>) -> Result<Self> {
        let spool = SpoolDir::new(&config.spool_root, config.log.clone());
        let log = spool.open(&config.user)?;
        let crypto = Arc::new(CryptoBox::new(&config.user, keys.secret(), peer));

        tracing::info!(user = %config.user, log = %log.path().display(), "account opened");

        Ok(Self {
            sender: CommandSender::new(crypto.clone(), log),
            crypto,
            config,
            store,
            tick_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn user(&self) -> &str {
        &self.config.user
    }

    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// The local mailbox.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn log(&self) -> &CommandLog {
        self.sender.log()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sending
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal and append a command; returns its log position.
    pub async fn send(&self, command: Command) -> Result<u64> {
        let sender = self.sender.clone();
        let position = tokio::task::spawn_blocking(move || sender.send(&command))
            .await
            .map_err(|e| MailspoolError::Task(format!("spawn_blocking failed: {e}")))??;
        Ok(position)
    }

    /// Request a flag change on one message.
    pub async fn set_flag(&self, id: MessageId, flag: Flag, value: bool) -> Result<u64> {
        self.send(Command::set_flag(id, flag, value)).await
    }

    /// Request the same flag change on several messages.
    ///
    /// Returns the position of each command, in the order of `ids`.
    pub async fn store_flags(&self, ids: &[MessageId], flag: &Flag, value: bool) -> Result<Vec<u64>> {
        let mut positions = Vec::with_capacity(ids.len());
        for id in ids {
            positions.push(self.set_flag(*id, flag.clone(), value).await?);
        }
        Ok(positions)
    }

    /// Request an expunge.
    ///
    /// Returns the command's position and the messages the local mailbox
    /// currently has marked deleted; they disappear once the engine applies
    /// the command.
    pub async fn expunge(&self) -> Result<(u64, Vec<MessageId>)> {
        let position = self.send(Command::Expunge).await?;
        let doomed = self.store.to_expunge().await?;
        Ok((position, doomed))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Syncing
    // ─────────────────────────────────────────────────────────────────────────

    fn engine(&self) -> SyncEngine<S, CommandLog> {
        SyncEngine::new(
            self.config.user.clone(),
            self.store.clone(),
            Arc::new(self.log().clone()),
            self.crypto.clone(),
            self.config.sync.clone(),
        )
        .with_tick_lock(self.tick_lock.clone())
    }

    /// Run one synchronisation pass now.
    ///
    /// Waits for a tick already running on this account's worker.
    pub async fn sync_once(&self) -> TickReport {
        self.engine().tick().await
    }

    /// Start the background worker.
    pub fn start_sync(&self) -> SyncHandle {
        self.engine().spawn()
    }
}
