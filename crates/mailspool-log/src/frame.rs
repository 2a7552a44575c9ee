//! Record framing.
//!
//! ```text
//! +----------------------+----------------------+
//! | length: i32 LE (4)   | payload (length)     |
//! +----------------------+----------------------+
//! ```
//!
//! Frames are written back to back with no padding, trailer or checksum.
//! Integrity comes from the authentication tag inside each payload.

use std::io::{self, Read};

use crate::error::{LogError, Result};

/// Length of the frame prefix.
pub const PREFIX_LEN: u64 = 4;

/// Encode one frame.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    let len = i32::try_from(payload.len()).map_err(|_| LogError::RecordTooLarge {
        len: payload.len(),
    })?;

    let mut buf = Vec::with_capacity(PREFIX_LEN as usize + payload.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Outcome of reading one frame.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameRead {
    /// A complete frame.
    Frame(Vec<u8>),
    /// Clean end of file: no prefix bytes at all.
    Eof,
    /// Fewer bytes than the frame needs.
    Short { have: u64, want: u64 },
}

/// Read the frame that starts at `position`.
///
/// A negative length prefix is always a framing error. Short reads are
/// reported, not judged; the caller decides what they mean.
pub fn read<R: Read>(reader: &mut R, position: u64) -> Result<FrameRead> {
    let mut prefix = [0u8; PREFIX_LEN as usize];
    let got = read_full(reader, &mut prefix)?;
    if got == 0 {
        return Ok(FrameRead::Eof);
    }
    if got < prefix.len() {
        return Ok(FrameRead::Short {
            have: got as u64,
            want: PREFIX_LEN,
        });
    }

    let len = i32::from_le_bytes(prefix);
    if len < 0 {
        return Err(LogError::Framing {
            position,
            reason: format!("negative record length {len}"),
        });
    }

    // Grow as bytes arrive so a corrupt prefix cannot force a huge allocation.
    let want = len as u64;
    let mut payload = Vec::new();
    reader.by_ref().take(want).read_to_end(&mut payload)?;
    if (payload.len() as u64) < want {
        return Ok(FrameRead::Short {
            have: PREFIX_LEN + payload.len() as u64,
            want: PREFIX_LEN + want,
        });
    }

    Ok(FrameRead::Frame(payload))
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
