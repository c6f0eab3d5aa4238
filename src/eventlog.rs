//! The append-only, timestamped event log used by CAPTURE and REPLAY.

use {
    crate::wire::{HEADER_SIZE, MAX_MESSAGE_SIZE},
    std::{
        fs::File,
        io::{self, Read, Write},
        path::Path,
        time::Duration,
    },
    thiserror::Error,
};

#[derive(Debug, Error)]
pub(crate) enum EventLogError {
    #[error("could not open the event log")]
    Open(#[source] io::Error),
    #[error("could not read from the event log")]
    Read(#[source] io::Error),
    #[error("could not write to the event log")]
    Write(#[source] io::Error),
    #[error("event log is truncated: expected {need} more bytes, found {have}")]
    Truncated { need: usize, have: usize },
    #[error("event log frame claims a size of {0} bytes, which is outside [8, {MAX_MESSAGE_SIZE}]")]
    BadFrameSize(u16),
}

/// Writes `(dt, raw message bytes)` frames as they are captured.
pub(crate) struct CaptureLog {
    file: File,
}

impl CaptureLog {
    pub(crate) fn create(path: &Path) -> Result<Self, EventLogError> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(EventLogError::Open)?;
        Ok(Self { file })
    }

    pub(crate) fn append(&mut self, dt: Duration, message: &[u8]) -> Result<(), EventLogError> {
        let mut frame = Vec::with_capacity(16 + message.len());
        frame.extend_from_slice(&(dt.as_secs() as i64).to_le_bytes());
        frame.extend_from_slice(&(dt.subsec_nanos() as i64).to_le_bytes());
        frame.extend_from_slice(message);
        self.file.write_all(&frame).map_err(EventLogError::Write)
    }
}

/// Reads `(dt, raw message bytes)` frames back out in order during REPLAY.
///
/// `next_due` holds the relative deadline of the next frame that has not yet been
/// delivered, or `None` once the log is exhausted.
pub(crate) struct ReplayLog {
    file: File,
    next_due: Option<Duration>,
}

impl ReplayLog {
    pub(crate) fn open(path: &Path) -> Result<Self, EventLogError> {
        let mut file = File::open(path).map_err(EventLogError::Open)?;
        let next_due = read_dt(&mut file)?;
        Ok(Self { file, next_due })
    }

    pub(crate) fn next_due(&self) -> Option<Duration> {
        self.next_due
    }

    /// Reads out the next frame's message bytes and advances `next_due` to the frame
    /// after it. Returns `Ok(None)` once the log is exhausted, which the caller should
    /// treat as a transition to `Mode::Idle`.
    pub(crate) fn take_frame(&mut self) -> Result<Option<Vec<u8>>, EventLogError> {
        if self.next_due.is_none() {
            return Ok(None);
        }
        let mut header = [0u8; HEADER_SIZE];
        read_exact(&mut self.file, &mut header)?;
        let size = u16::from_ne_bytes(header[6..8].try_into().unwrap());
        if !(HEADER_SIZE..=MAX_MESSAGE_SIZE).contains(&(size as usize)) {
            return Err(EventLogError::BadFrameSize(size));
        }
        let mut message = vec![0u8; size as usize];
        message[..HEADER_SIZE].copy_from_slice(&header);
        read_exact(&mut self.file, &mut message[HEADER_SIZE..])?;
        self.next_due = read_dt(&mut self.file)?;
        Ok(Some(message))
    }
}

/// Reads a `(i64, i64)` little-endian `dt` pair, or `None` on a clean EOF at the frame
/// boundary.
fn read_dt(file: &mut File) -> Result<Option<Duration>, EventLogError> {
    let mut buf = [0u8; 16];
    let n = read_up_to(file, &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    if n != buf.len() {
        return Err(EventLogError::Truncated {
            need: buf.len(),
            have: n,
        });
    }
    let sec = i64::from_le_bytes(buf[0..8].try_into().unwrap());
    let nsec = i64::from_le_bytes(buf[8..16].try_into().unwrap());
    Ok(Some(Duration::new(sec as u64, nsec as u32)))
}

fn read_exact(file: &mut File, buf: &mut [u8]) -> Result<(), EventLogError> {
    let n = read_up_to(file, buf)?;
    if n != buf.len() {
        return Err(EventLogError::Truncated {
            need: buf.len(),
            have: n,
        });
    }
    Ok(())
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> Result<usize, EventLogError> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EventLogError::Read(e)),
        }
    }
    Ok(total)
}
