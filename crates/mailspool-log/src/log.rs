//! The per-user append-only command log.
//!
//! Writers serialize on an exclusive `flock` over the log file, held only for
//! the duration of one append. A failed append truncates the file back to
//! where it started before releasing the lock. Readers do not lock while
//! reading: they snapshot the file length and read forward, so they may race
//! an append in progress. [`ShortReadPolicy`] decides what a half-written
//! tail means.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use nix::fcntl::{Flock, FlockArg};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LogError, Result};
use crate::frame::{self, FrameRead, PREFIX_LEN};

/// What a scan does when the file ends in the middle of a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortReadPolicy {
    /// The tail is an append still in flight. The scan ends at the start of
    /// the partial frame and the next scan picks it up once complete.
    ///
    /// If no writer holds the append lock and the file still ends inside the
    /// frame, the tail is torn and the scan fails with a framing error.
    #[default]
    TreatAsEnd,
    /// The tail is corruption. The scan fails with a framing error.
    Fatal,
}

/// Configuration for a command log.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// How scans treat a partial trailing frame.
    pub short_read: ShortReadPolicy,
    /// Whether to `fsync` after every append.
    pub fsync: bool,
}

/// One record read back from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Byte offset where this record's frame begins.
    pub position: u64,
    /// The opaque ciphertext.
    pub payload: Bytes,
}

impl LogEntry {
    /// Offset of the frame that follows this one.
    pub fn next_position(&self) -> u64 {
        self.position + PREFIX_LEN + self.payload.len() as u64
    }
}

/// An item yielded by [`Scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    /// A complete record.
    Record(LogEntry),
    /// End of the readable log. The position is where the next scan should start.
    End(u64),
}

impl ScanItem {
    /// Position of this item.
    pub fn position(&self) -> u64 {
        match self {
            ScanItem::Record(entry) => entry.position,
            ScanItem::End(position) => *position,
        }
    }
}

/// A lazy forward scan over the log.
///
/// Yields records in append order, then exactly one [`ScanItem::End`], or
/// stops after the first error.
pub struct Scan {
    reader: Option<BufReader<File>>,
    path: PathBuf,
    position: u64,
    policy: ShortReadPolicy,
    finished: bool,
}

impl Scan {
    fn empty(path: PathBuf, position: u64, policy: ShortReadPolicy) -> Self {
        Self {
            reader: None,
            path,
            position,
            policy,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.reader = None;
        self.finished = true;
    }
}

impl Iterator for Scan {
    type Item = Result<ScanItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let position = self.position;
        let Some(reader) = self.reader.as_mut() else {
            self.finish();
            return Some(Ok(ScanItem::End(position)));
        };

        match frame::read(reader, position) {
            Ok(FrameRead::Frame(payload)) => {
                let entry = LogEntry {
                    position,
                    payload: Bytes::from(payload),
                };
                self.position = entry.next_position();
                Some(Ok(ScanItem::Record(entry)))
            }
            Ok(FrameRead::Eof) => {
                self.finish();
                Some(Ok(ScanItem::End(position)))
            }
            Ok(FrameRead::Short { have, want }) => {
                self.finish();
                match self.policy {
                    ShortReadPolicy::TreatAsEnd if is_torn(&self.path, position + want) => {
                        warn!(
                            path = %self.path.display(),
                            position,
                            have,
                            want,
                            "torn frame with no append in flight"
                        );
                        Some(Err(LogError::Framing {
                            position,
                            reason: format!("torn frame: {have} of {want} bytes and no writer"),
                        }))
                    }
                    ShortReadPolicy::TreatAsEnd => {
                        debug!(position, have, want, "partial frame at tail, ending scan");
                        Some(Ok(ScanItem::End(position)))
                    }
                    ShortReadPolicy::Fatal => Some(Err(LogError::Framing {
                        position,
                        reason: format!("short read: {have} of {want} bytes"),
                    })),
                }
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

/// Whether a short frame ending at `frame_end` is abandoned.
///
/// Appends hold the exclusive lock until their frame is complete or rolled
/// back. If a shared lock is free and the file still ends before
/// `frame_end`, nothing is going to finish the frame.
fn is_torn(path: &Path, frame_end: u64) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    match Flock::lock(file, FlockArg::LockSharedNonblock) {
        Ok(file) => file.metadata().map(|meta| meta.len() < frame_end).unwrap_or(false),
        Err(_) => false,
    }
}

/// A log file an append can write, sync and roll back.
trait AppendTarget: Write {
    fn sync(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl AppendTarget for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write one frame at `position`, the current end of a locked log file.
///
/// On a failed write or sync the file is cut back to `position` so no
/// partial frame is left behind for readers.
fn write_frame<F: AppendTarget>(file: &mut F, position: u64, frame: &[u8], fsync: bool) -> Result<()> {
    let written = match file.write_all(frame) {
        Ok(()) if fsync => file.sync(),
        other => other,
    };
    if let Err(e) = written {
        match file.truncate(position) {
            Ok(()) => warn!(position, error = %e, "append failed, rolled back partial frame"),
            Err(rollback) => warn!(
                position,
                error = %e,
                rollback = %rollback,
                "append failed and partial frame could not be removed"
            ),
        }
        return Err(e.into());
    }
    Ok(())
}

/// Serializable form of one scan item, as handed to a transport.
///
/// `entry` is `None` for the terminal sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub position: u64,
    pub entry: Option<Bytes>,
}

impl From<ScanItem> for ScanRecord {
    fn from(item: ScanItem) -> Self {
        match item {
            ScanItem::Record(entry) => ScanRecord {
                position: entry.position,
                entry: Some(entry.payload),
            },
            ScanItem::End(position) => ScanRecord {
                position,
                entry: None,
            },
        }
    }
}

/// A user's command log file.
///
/// Cheap to clone; clones share the in-process append guard.
#[derive(Debug, Clone)]
pub struct CommandLog {
    path: PathBuf,
    config: LogConfig,
    append_guard: Arc<Mutex<()>>,
}

impl CommandLog {
    /// Open a log at `path`. The file is created on first append.
    pub fn open(path: impl AsRef<Path>, config: LogConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
            append_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Append one record and return the offset where its frame begins.
    pub fn append(&self, record: &[u8]) -> Result<u64> {
        let frame = frame::encode(record)?;

        let _guard = self.append_guard.lock().map_err(|_| LogError::Poisoned)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut file = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| errno)?;

        let position = file.metadata()?.len();
        write_frame(&mut *file, position, &frame, self.config.fsync)?;
        drop(file);

        debug!(path = %self.path.display(), position, len = record.len(), "appended record");
        Ok(position)
    }

    /// Current end offset of the log; zero if it does not exist yet.
    pub fn end_position(&self) -> Result<u64> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Scan forward from `start`.
    ///
    /// When `start` is at or past the end of the file the scan yields only
    /// `End(start)`. A log that does not exist yet scans as empty.
    pub fn scan(&self, start: u64) -> Result<Scan> {
        let policy = self.config.short_read;
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Scan::empty(self.path.clone(), start, policy))
            }
            Err(e) => return Err(e.into()),
        };

        let end = file.metadata()?.len();
        if start >= end {
            if start > end {
                warn!(path = %self.path.display(), start, end, "scan starts past end of log");
            }
            return Ok(Scan::empty(self.path.clone(), start, policy));
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(start))?;
        Ok(Scan {
            reader: Some(reader),
            path: self.path.clone(),
            position: start,
            policy,
            finished: false,
        })
    }

    /// Scan from `start` into the list shape served to transports.
    pub fn scan_records(&self, start: u64) -> Result<Vec<ScanRecord>> {
        self.scan(start)?
            .map(|item| item.map(ScanRecord::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;

    fn temp_log(config: LogConfig) -> (tempfile::TempDir, CommandLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = CommandLog::open(dir.path().join("log"), config);
        (dir, log)
    }

    fn collect(log: &CommandLog, start: u64) -> Vec<ScanItem> {
        log.scan(start)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    fn records(items: &[ScanItem]) -> Vec<&[u8]> {
        items
            .iter()
            .filter_map(|item| match item {
                ScanItem::Record(entry) => Some(entry.payload.as_ref()),
                ScanItem::End(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_append_returns_frame_offsets() {
        let (_dir, log) = temp_log(LogConfig::default());

        assert_eq!(log.append(b"r1").unwrap(), 0);
        assert_eq!(log.append(b"r22").unwrap(), 6);
        assert_eq!(log.append(b"").unwrap(), 13);
        assert_eq!(log.end_position().unwrap(), 17);
    }

    #[test]
    fn test_scan_in_append_order() {
        let (_dir, log) = temp_log(LogConfig::default());
        let p1 = log.append(b"r1").unwrap();
        let p2 = log.append(b"r2").unwrap();
        let p3 = log.append(b"r3").unwrap();

        let items = collect(&log, 0);
        let positions: Vec<u64> = items.iter().map(ScanItem::position).collect();

        assert_eq!(records(&items), vec![&b"r1"[..], b"r2", b"r3"]);
        assert_eq!(positions, vec![p1, p2, p3, log.end_position().unwrap()]);
        assert!(p1 < p2 && p2 < p3);
        assert!(matches!(items.last(), Some(ScanItem::End(_))));
    }

    #[test]
    fn test_resume_from_record_position() {
        let (_dir, log) = temp_log(LogConfig::default());
        log.append(b"r1").unwrap();
        let p2 = log.append(b"r2").unwrap();
        log.append(b"r3").unwrap();

        let items = collect(&log, p2);
        assert_eq!(records(&items), vec![&b"r2"[..], b"r3"]);
    }

    #[test]
    fn test_resume_from_sentinel_sees_only_new_records() {
        let (_dir, log) = temp_log(LogConfig::default());
        log.append(b"old").unwrap();
        let end = collect(&log, 0).last().unwrap().position();

        log.append(b"new1").unwrap();
        log.append(b"new2").unwrap();

        let items = collect(&log, end);
        assert_eq!(records(&items), vec![&b"new1"[..], b"new2"]);
    }

    #[test]
    fn test_scan_at_end_yields_only_sentinel() {
        let (_dir, log) = temp_log(LogConfig::default());
        log.append(b"r1").unwrap();
        let end = log.end_position().unwrap();

        assert_eq!(collect(&log, end), vec![ScanItem::End(end)]);
    }

    #[test]
    fn test_missing_log_scans_empty() {
        let (_dir, log) = temp_log(LogConfig::default());
        assert_eq!(collect(&log, 0), vec![ScanItem::End(0)]);
        assert_eq!(log.end_position().unwrap(), 0);
    }

    /// Take the append lock the way a writer does, to stage a frame in flight.
    fn in_flight(log: &CommandLog) -> Flock<File> {
        let file = OpenOptions::new().append(true).open(log.path()).unwrap();
        Flock::lock(file, FlockArg::LockExclusive).unwrap()
    }

    #[test]
    fn test_partial_tail_treated_as_end() {
        let (_dir, log) = temp_log(LogConfig::default());
        log.append(b"complete").unwrap();
        let torn_at = log.end_position().unwrap();

        // Prefix promises 10 bytes, only 3 arrive.
        let mut writer = in_flight(&log);
        writer.write_all(&10i32.to_le_bytes()).unwrap();
        writer.write_all(b"abc").unwrap();

        let items = collect(&log, 0);
        assert_eq!(records(&items), vec![&b"complete"[..]]);
        assert_eq!(items.last(), Some(&ScanItem::End(torn_at)));

        // Once the writer finishes, the record becomes visible from the same cursor.
        writer.write_all(b"defghij").unwrap();
        drop(writer);
        let items = collect(&log, torn_at);
        assert_eq!(records(&items), vec![&b"abcdefghij"[..]]);
    }

    #[test]
    fn test_partial_prefix_treated_as_end() {
        let (_dir, log) = temp_log(LogConfig::default());
        log.append(b"complete").unwrap();
        let torn_at = log.end_position().unwrap();

        let mut writer = in_flight(&log);
        writer.write_all(&[1, 0]).unwrap();

        let items = collect(&log, 0);
        assert_eq!(items.last(), Some(&ScanItem::End(torn_at)));
    }

    #[test]
    fn test_abandoned_partial_tail_is_torn() {
        let (_dir, log) = temp_log(LogConfig::default());
        log.append(b"complete").unwrap();
        let torn_at = log.end_position().unwrap();

        let mut writer = in_flight(&log);
        writer.write_all(&10i32.to_le_bytes()).unwrap();
        writer.write_all(b"abc").unwrap();
        assert_eq!(collect(&log, 0).last(), Some(&ScanItem::End(torn_at)));

        // The writer gives up without finishing or rolling back.
        drop(writer);
        let items: Vec<Result<ScanItem>> = log.scan(0).unwrap().collect();
        assert_eq!(items.len(), 2);
        match &items[1] {
            Err(LogError::Framing { position, .. }) => assert_eq!(*position, torn_at),
            other => panic!("expected framing error, got {:?}", other),
        }
    }

    #[test]
    fn test_appends_after_torn_frame_are_not_silently_hidden() {
        let (_dir, log) = temp_log(LogConfig::default());
        log.append(b"good").unwrap();
        let torn_at = log.end_position().unwrap();

        // A crashed writer left a prefix for 1000 bytes and 5 of them.
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(&1000i32.to_le_bytes()).unwrap();
        file.write_all(b"12345").unwrap();
        drop(file);

        log.append(b"after-1").unwrap();
        log.append(b"after-2").unwrap();

        for _ in 0..3 {
            let items: Vec<Result<ScanItem>> = log.scan(0).unwrap().collect();
            assert!(matches!(&items[0], Ok(ScanItem::Record(entry)) if entry.payload.as_ref() == b"good"));
            match &items[1] {
                Err(LogError::Framing { position, .. }) => assert_eq!(*position, torn_at),
                other => panic!("expected framing error, got {:?}", other),
            }
        }
    }

    /// Accepts `accept` bytes, then fails; optionally fails sync too.
    struct FailingFile {
        data: Vec<u8>,
        accept: usize,
        fail_sync: bool,
    }

    impl Write for FailingFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.accept.saturating_sub(self.data.len());
            if room == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl AppendTarget for FailingFile {
        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                return Err(io::Error::other("sync failed"));
            }
            Ok(())
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_rolls_back_partial_frame() {
        let mut file = FailingFile {
            data: b"existing".to_vec(),
            accept: 13,
            fail_sync: false,
        };
        let frame = frame::encode(b"0123456789").unwrap();

        let result = write_frame(&mut file, 8, &frame, false);
        assert!(matches!(result, Err(LogError::Io(_))));
        assert_eq!(file.data, b"existing");
    }

    #[test]
    fn test_failed_sync_rolls_back_frame() {
        let mut file = FailingFile {
            data: b"existing".to_vec(),
            accept: usize::MAX,
            fail_sync: true,
        };
        let frame = frame::encode(b"payload").unwrap();

        assert!(write_frame(&mut file, 8, &frame, true).is_err());
        assert_eq!(file.data, b"existing");

        // Once sync succeeds the same write goes through.
        file.fail_sync = false;
        write_frame(&mut file, 8, &frame, true).unwrap();
        assert_eq!(file.data.len(), 8 + frame.len());
    }

    #[test]
    fn test_partial_tail_fatal_policy() {
        let (_dir, log) = temp_log(LogConfig {
            short_read: ShortReadPolicy::Fatal,
            ..LogConfig::default()
        });
        log.append(b"complete").unwrap();
        let torn_at = log.end_position().unwrap();

        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(&10i32.to_le_bytes()).unwrap();
        file.write_all(b"abc").unwrap();

        let items: Vec<Result<ScanItem>> = log.scan(0).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(ScanItem::Record(_))));
        match &items[1] {
            Err(LogError::Framing { position, .. }) => assert_eq!(*position, torn_at),
            other => panic!("expected framing error, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_length_is_fatal_under_either_policy() {
        let (_dir, log) = temp_log(LogConfig::default());
        log.append(b"ok").unwrap();
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(&(-5i32).to_le_bytes()).unwrap();

        let result: Result<Vec<ScanItem>> = log.scan(0).unwrap().collect();
        assert!(result.unwrap_err().is_framing());
    }

    #[test]
    fn test_scan_records_shape() {
        let (_dir, log) = temp_log(LogConfig::default());
        log.append(b"x").unwrap();

        let out = log.scan_records(0).unwrap();
        assert_eq!(
            out,
            vec![
                ScanRecord {
                    position: 0,
                    entry: Some(Bytes::from_static(b"x")),
                },
                ScanRecord {
                    position: 5,
                    entry: None,
                },
            ]
        );

        let json = serde_json::to_value(&out).unwrap();
        assert!(json[1]["entry"].is_null());
        assert_eq!(json[1]["position"], 5);
    }

    #[test]
    fn test_concurrent_appends_are_serialized() {
        let (_dir, log) = temp_log(LogConfig::default());
        let writers = 8;
        let per_writer = 50;

        std::thread::scope(|scope| {
            for w in 0..writers {
                let log = log.clone();
                scope.spawn(move || {
                    for i in 0..per_writer {
                        let record = format!("writer-{w}-record-{i}-{}", "x".repeat(i * 7));
                        log.append(record.as_bytes()).unwrap();
                    }
                });
            }
        });

        let items = collect(&log, 0);
        let found = records(&items);
        assert_eq!(found.len(), writers * per_writer);
        for record in found {
            let text = std::str::from_utf8(record).unwrap();
            assert!(text.starts_with("writer-"));
        }
        assert_eq!(
            items.last(),
            Some(&ScanItem::End(fs::metadata(log.path()).unwrap().len()))
        );
    }

    #[test]
    fn test_separate_handles_share_file_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");

        std::thread::scope(|scope| {
            for w in 0..4 {
                // Independent handles: only the file lock orders them.
                let log = CommandLog::open(&path, LogConfig::default());
                scope.spawn(move || {
                    for i in 0..25 {
                        log.append(format!("{w}:{i}").as_bytes()).unwrap();
                    }
                });
            }
        });

        let log = CommandLog::open(&path, LogConfig::default());
        assert_eq!(records(&collect(&log, 0)).len(), 100);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn test_scan_from_any_position_yields_exact_tail(
            batch in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..96), 0..12),
        ) {
            let (_dir, log) = temp_log(LogConfig::default());
            let positions: Vec<u64> = batch.iter().map(|r| log.append(r).unwrap()).collect();
            let end = log.end_position().unwrap();

            for (index, position) in positions.iter().enumerate() {
                let items = collect(&log, *position);
                let tail: Vec<&[u8]> = batch[index..].iter().map(Vec::as_slice).collect();
                prop_assert_eq!(records(&items), tail);
                prop_assert_eq!(items.last(), Some(&ScanItem::End(end)));
                let starts: Vec<u64> = items.iter().map(ScanItem::position).collect();
                prop_assert_eq!(&starts[..starts.len() - 1], &positions[index..]);
            }
            prop_assert_eq!(collect(&log, end), vec![ScanItem::End(end)]);
        }
    }
}
