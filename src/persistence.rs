//! Trace file format
//!
//! ## File layout
//! ```text
//! Header:  event_count (u32 LE)                                        = 4 bytes
//!
//! Record (repeated event_count times, oldest first):
//!   kind(u8) + depth(u32) + function(u64) + call_site(u64)
//!     + secs(i64) + nanos(u32)                                         = 33 bytes
//! ```
//!
//! `kind` is 0 for entry, 1 for exit. All integers are little-endian. `nanos`
//! must be below 1_000_000_000. The depth is stored so a window that starts in
//! the middle of a call chain replays the same way after a round trip.

use crate::error::{ProfError, Result};
use crate::event::{CallSite, Event, EventKind, FunctionAddr};
use crate::time::{Timestamp, NANOS_PER_SEC};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

pub const HEADER_SIZE: usize = 4;
pub const RECORD_SIZE: usize = 33;

/// Largest event count a file may declare
pub const MAX_EVENTS: u32 = 1 << 26;

const WIRE_ENTRY: u8 = 0;
const WIRE_EXIT: u8 = 1;

/// Upper bound on the vector preallocated from an untrusted header
const PREALLOC_LIMIT: usize = 4096;

pub fn encode_event(event: &Event) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0] = match event.kind {
        EventKind::Entry => WIRE_ENTRY,
        EventKind::Exit => WIRE_EXIT,
    };
    buf[1..5].copy_from_slice(&event.depth.to_le_bytes());
    buf[5..13].copy_from_slice(&event.function.0.to_le_bytes());
    buf[13..21].copy_from_slice(&event.call_site.0.to_le_bytes());
    buf[21..29].copy_from_slice(&event.timestamp.secs().to_le_bytes());
    buf[29..33].copy_from_slice(&event.timestamp.subsec_nanos().to_le_bytes());
    buf
}

pub fn decode_event(buf: &[u8; RECORD_SIZE]) -> Result<Event> {
    let kind = match buf[0] {
        WIRE_ENTRY => EventKind::Entry,
        WIRE_EXIT => EventKind::Exit,
        other => {
            return Err(ProfError::CorruptFile(format!(
                "unknown event kind {other}"
            )))
        }
    };
    let depth = u32::from_le_bytes(le_bytes(&buf[1..5]));
    let function = u64::from_le_bytes(le_bytes(&buf[5..13]));
    let call_site = u64::from_le_bytes(le_bytes(&buf[13..21]));
    let secs = i64::from_le_bytes(le_bytes(&buf[21..29]));
    let nanos = u32::from_le_bytes(le_bytes(&buf[29..33]));
    if nanos >= NANOS_PER_SEC {
        return Err(ProfError::CorruptFile(format!(
            "nanosecond field {nanos} out of range"
        )));
    }

    Ok(Event::new(
        kind,
        FunctionAddr(function),
        CallSite(call_site),
        depth,
        Timestamp::new(secs, nanos),
    ))
}

fn le_bytes<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

/// Counts the bytes the underlying sink accepted
struct CountingWriter<W> {
    inner: W,
    bytes: usize,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Write the header and every record through an internal buffer
///
/// Any failure is reported as `PartialWrite`, where `written` counts the
/// records `w` fully accepted before the error. Bytes still buffered at that
/// point are discarded, not retried.
pub fn write_events<W: Write>(w: &mut W, events: &[Event]) -> Result<()> {
    let count = u32::try_from(events.len())
        .ok()
        .filter(|&n| n <= MAX_EVENTS)
        .ok_or_else(|| {
            ProfError::CorruptFile(format!(
                "window of {} events exceeds the {MAX_EVENTS} event limit",
                events.len()
            ))
        })?;

    let mut out = BufWriter::new(CountingWriter { inner: w, bytes: 0 });
    let outcome = write_records(&mut out, count, events).and_then(|()| out.flush());
    let (sink, _unflushed) = out.into_parts();

    outcome.map_err(|source| ProfError::PartialWrite {
        written: sink.bytes.saturating_sub(HEADER_SIZE) / RECORD_SIZE,
        expected: events.len(),
        source,
    })
}

fn write_records<W: Write>(out: &mut W, count: u32, events: &[Event]) -> std::io::Result<()> {
    out.write_all(&count.to_le_bytes())?;
    for event in events {
        out.write_all(&encode_event(event))?;
    }
    Ok(())
}

/// Read a header and the records it announces
pub fn read_events<R: Read>(r: &mut R) -> Result<Vec<Event>> {
    let mut header = [0u8; HEADER_SIZE];
    r.read_exact(&mut header).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => ProfError::CorruptFile("file shorter than header".into()),
        _ => ProfError::Stream(e),
    })?;

    let count = u32::from_le_bytes(header);
    if count > MAX_EVENTS {
        return Err(ProfError::CorruptFile(format!(
            "header declares {count} events, limit is {MAX_EVENTS}"
        )));
    }

    let expected = count as usize;
    let mut events = Vec::with_capacity(expected.min(PREALLOC_LIMIT));
    let mut record = [0u8; RECORD_SIZE];
    for read in 0..expected {
        r.read_exact(&mut record).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => ProfError::TruncatedFile { expected, read },
            _ => ProfError::Stream(e),
        })?;
        events.push(decode_event(&record)?);
    }
    Ok(events)
}

/// Save a chronological event window to `path`
///
/// A partially written file is left on disk when the write fails midway.
pub fn save(path: impl AsRef<Path>, events: &[Event]) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path).map_err(|source| ProfError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    write_events(&mut file, events)?;
    tracing::debug!(path = %path.display(), events = events.len(), "trace saved");
    Ok(())
}

/// Load a chronological event window from `path`
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Event>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ProfError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let events = read_events(&mut BufReader::new(file))?;
    tracing::debug!(path = %path.display(), events = events.len(), "trace loaded");
    Ok(events)
}

/// Decode a complete in-memory trace file
pub fn decode(mut bytes: &[u8]) -> Result<Vec<Event>> {
    read_events(&mut bytes)
}

/// Encode a window into an in-memory trace file
pub fn encode(events: &[Event]) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE + events.len() * RECORD_SIZE);
    write_events(&mut bytes, events)?;
    Ok(bytes)
}
