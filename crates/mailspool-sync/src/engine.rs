//! The background sync engine.
//!
//! Each tick reads the persisted cursor, scans the spool from there, opens and
//! applies every record in log order, and persists the new cursor.
//!
//! ## Tick
//!
//! ```text
//! Idle -> Scanning -> Applying -> Idle
//!           |            |
//!           |            +-- decrypt / decode / apply failure: warn, skip
//!           +-- framing failure: apply what was read, stop the cursor
//!               at the bad frame, retry next tick
//! ```
//!
//! A record that fails to open, decode or apply is skipped for good: the
//! cursor moves past it. A framing failure is never skipped.
//!
//! Engines that share a tick lock (see [`SyncEngine::with_tick_lock`]) never
//! run ticks at the same time, so two of them over one mailbox cannot both
//! read the same cursor.

use std::sync::Arc;
use std::time::Duration;

use mailspool_crypto::CryptoBox;
use mailspool_log::{LogEntry, ScanEnd, SpoolReader};
use mailspool_store::MailboxStore;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::command::Command;
use crate::error::{Result, SyncError};

/// Default time between ticks.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(300);

/// Configuration for the sync worker.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between ticks when nothing triggers the worker.
    pub period: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
        }
    }
}

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Scanning,
    Applying,
    Stopping,
    Stopped,
}

/// Outcome of one tick.
#[derive(Debug)]
pub struct TickReport {
    /// Cursor the tick started from.
    pub start: u64,
    /// Cursor after the tick.
    pub cursor: u64,
    /// Records applied.
    pub applied: usize,
    /// Records skipped because they could not be opened, decoded or applied.
    pub skipped: usize,
    /// Why the tick stopped early, if it did.
    pub error: Option<SyncError>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

enum Outcome {
    Applied,
    Skipped,
}

/// Applies one user's spool to their local mailbox.
pub struct SyncEngine<S: ?Sized, R: ?Sized> {
    user: String,
    store: Arc<S>,
    reader: Arc<R>,
    crypto: Arc<CryptoBox>,
    config: SyncConfig,
    state: watch::Sender<EngineState>,
    tick_lock: Arc<Mutex<()>>,
}

impl<S, R> SyncEngine<S, R>
where
    S: MailboxStore + ?Sized + 'static,
    R: SpoolReader + ?Sized + 'static,
{
    pub fn new(
        user: impl Into<String>,
        store: Arc<S>,
        reader: Arc<R>,
        crypto: Arc<CryptoBox>,
        config: SyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        Self {
            user: user.into(),
            store,
            reader,
            crypto,
            config,
            state,
            tick_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Serialize this engine's ticks with every other engine holding `lock`.
    pub fn with_tick_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.tick_lock = lock;
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: EngineState) {
        self.state.send_replace(state);
    }

    /// Run one synchronisation pass.
    ///
    /// Never fails outright; problems are logged and reported in
    /// [`TickReport::error`], and the next tick retries from the persisted
    /// cursor.
    pub async fn tick(&self) -> TickReport {
        let span = tracing::info_span!("sync_tick", user = %self.user);
        async move {
            let _turn = match self.tick_lock.try_lock() {
                Ok(turn) => turn,
                Err(_) => {
                    tracing::debug!("another tick is running, waiting");
                    self.tick_lock.lock().await
                }
            };
            let report = self.run_tick().await;
            self.set_state(EngineState::Idle);

            match &report.error {
                None => tracing::info!(
                    start = report.start,
                    cursor = report.cursor,
                    applied = report.applied,
                    skipped = report.skipped,
                    "tick complete"
                ),
                Some(error) => tracing::error!(
                    start = report.start,
                    cursor = report.cursor,
                    applied = report.applied,
                    skipped = report.skipped,
                    %error,
                    "tick stopped early"
                ),
            }
            report
        }
        .instrument(span)
        .await
    }

    async fn run_tick(&self) -> TickReport {
        let stored = match self.store.get_sync_state().await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cursor, starting from 0");
                None
            }
        };
        let start = stored.unwrap_or(0);

        let mut report = TickReport {
            start,
            cursor: start,
            applied: 0,
            skipped: 0,
            error: None,
        };

        self.set_state(EngineState::Scanning);
        let batch = match self.reader.scan_batch(start).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(start, error = %e, "scan failed to start");
                report.error = Some(e.into());
                return report;
            }
        };
        tracing::debug!(start, records = batch.entries.len(), "scanned spool");

        self.set_state(EngineState::Applying);
        for entry in &batch.entries {
            match self.process(entry).await {
                Outcome::Applied => report.applied += 1,
                Outcome::Skipped => report.skipped += 1,
            }
            report.cursor = entry.next_position();
        }

        match batch.end {
            ScanEnd::Complete(end) => report.cursor = end,
            ScanEnd::Failed { position, error } => {
                tracing::error!(position, error = %error, "spool scan broke, holding cursor");
                report.cursor = position;
                report.error = Some(error.into());
            }
        }

        if stored != Some(report.cursor) {
            if let Err(e) = self.store.set_sync_state(report.cursor).await {
                tracing::error!(cursor = report.cursor, error = %e, "failed to persist cursor");
                if report.error.is_none() {
                    report.error = Some(e.into());
                }
            }
        }

        report
    }

    async fn process(&self, entry: &LogEntry) -> Outcome {
        let position = entry.position;

        let plaintext = match self.crypto.decrypt(&entry.payload) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!(position, error = %e, "skipping record that failed to open");
                return Outcome::Skipped;
            }
        };

        let command = match Command::deserialize(&plaintext) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(position, error = %e, "skipping undecodable record");
                return Outcome::Skipped;
            }
        };

        match command.apply(self.store.as_ref()).await {
            Ok(()) => {
                tracing::debug!(position, op = command.op(), "applied command");
                Outcome::Applied
            }
            Err(e) => {
                tracing::warn!(position, op = command.op(), error = %e, "skipping command that failed to apply");
                Outcome::Skipped
            }
        }
    }
}

impl<S, R> SyncEngine<S, R>
where
    S: MailboxStore + ?Sized + 'static,
    R: SpoolReader + ?Sized + 'static,
{
    /// Move the engine onto its own task.
    ///
    /// The first tick runs immediately; after that the worker wakes every
    /// `period` or on [`SyncHandle::trigger`]. Must be called inside a tokio
    /// runtime.
    pub fn spawn(self) -> SyncHandle {
        let trigger = Arc::new(Notify::new());
        let (stop, mut stop_rx) = watch::channel(false);
        let state = self.subscribe();

        let wake = trigger.clone();
        let task = tokio::spawn(async move {
            tracing::info!(user = %self.user, period = ?self.config.period, "sync worker started");

            loop {
                if *stop_rx.borrow() {
                    break;
                }

                self.tick().await;

                let stop_requested = tokio::select! {
                    _ = tokio::time::sleep(self.config.period) => false,
                    _ = wake.notified() => {
                        tracing::debug!(user = %self.user, "sync triggered");
                        false
                    }
                    changed = stop_rx.changed() => changed.is_err() || *stop_rx.borrow(),
                };
                if stop_requested {
                    break;
                }
            }

            self.set_state(EngineState::Stopping);
            tracing::info!(user = %self.user, "sync worker stopped");
            self.set_state(EngineState::Stopped);
        });

        SyncHandle {
            trigger,
            stop,
            state,
            task: Some(task),
        }
    }
}

/// Control handle for a spawned [`SyncEngine`].
///
/// Dropping the handle asks the worker to stop without waiting for it.
pub struct SyncHandle {
    trigger: Arc<Notify>,
    stop: watch::Sender<bool>,
    state: watch::Receiver<EngineState>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Wake the worker now instead of at the end of the period.
    ///
    /// A trigger that arrives mid-tick runs one more tick right after.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }

    /// Ask the worker to stop and wait for it.
    ///
    /// An in-flight tick runs to completion first.
    pub async fn stop(mut self) -> Result<()> {
        self.stop.send_replace(true);
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| SyncError::Worker(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}
