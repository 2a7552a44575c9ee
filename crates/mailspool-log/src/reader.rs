//! Reader abstraction for the sync engine.
//!
//! The engine does not care whether the log is a local file or sits behind a
//! transport; it asks a [`SpoolReader`] for everything after its cursor and
//! gets back a [`ScanBatch`]. A batch always says where it stopped, including
//! when the scan broke partway through.

use async_trait::async_trait;

use crate::error::{LogError, Result};
use crate::log::{CommandLog, LogEntry, ScanItem, ScanRecord};

/// How a batch ended.
#[derive(Debug)]
pub enum ScanEnd {
    /// Reached the sentinel; resume from this position.
    Complete(u64),
    /// The scan broke at `position` (the first frame not read).
    Failed { position: u64, error: LogError },
}

impl ScanEnd {
    /// Where the next scan should start.
    pub fn position(&self) -> u64 {
        match self {
            ScanEnd::Complete(position) => *position,
            ScanEnd::Failed { position, .. } => *position,
        }
    }
}

/// Records read from one scan, in log order.
#[derive(Debug)]
pub struct ScanBatch {
    pub entries: Vec<LogEntry>,
    pub end: ScanEnd,
}

impl ScanBatch {
    /// Drain a scan iterator starting at `start`.
    pub fn collect<I>(start: u64, items: I) -> Self
    where
        I: IntoIterator<Item = Result<ScanItem>>,
    {
        let mut entries: Vec<LogEntry> = Vec::new();
        for item in items {
            match item {
                Ok(ScanItem::Record(entry)) => entries.push(entry),
                Ok(ScanItem::End(position)) => {
                    return Self {
                        entries,
                        end: ScanEnd::Complete(position),
                    }
                }
                Err(error) => {
                    let position = entries.last().map_or(start, LogEntry::next_position);
                    return Self {
                        entries,
                        end: ScanEnd::Failed { position, error },
                    };
                }
            }
        }

        // A well-formed scan always ends with a sentinel or an error.
        let position = entries.last().map_or(start, LogEntry::next_position);
        Self {
            entries,
            end: ScanEnd::Complete(position),
        }
    }

    /// Rebuild a batch from the list a transport returned.
    pub fn from_records(start: u64, records: Vec<ScanRecord>) -> Self {
        Self::collect(
            start,
            records.into_iter().map(|record| {
                Ok(match record.entry {
                    Some(payload) => ScanItem::Record(LogEntry {
                        position: record.position,
                        payload,
                    }),
                    None => ScanItem::End(record.position),
                })
            }),
        )
    }
}

/// Source of log records for the sync engine.
#[async_trait]
pub trait SpoolReader: Send + Sync {
    /// Read every record from `start` to the current end of the log.
    ///
    /// `Err` means the scan could not start at all; a scan that broke partway
    /// returns `Ok` with [`ScanEnd::Failed`].
    async fn scan_batch(&self, start: u64) -> Result<ScanBatch>;
}

#[async_trait]
impl SpoolReader for CommandLog {
    async fn scan_batch(&self, start: u64) -> Result<ScanBatch> {
        let log = self.clone();
        tokio::task::spawn_blocking(move || {
            let scan = log.scan(start)?;
            Ok(ScanBatch::collect(start, scan))
        })
        .await
        .map_err(|e| LogError::Task(e.to_string()))?
    }
}
