//! Wayland wire framing: header layout and the message scanner.

use thiserror::Error;

/// Size of the two-word message header in bytes.
pub(crate) const HEADER_SIZE: usize = 8;

/// Per-message cap enforced throughout the proxy.
pub(crate) const MAX_MESSAGE_SIZE: usize = 4096;

/// The well-known object id of `wl_display`, which is never allocated dynamically.
pub(crate) const WL_DISPLAY_ID: u32 = 1;

/// A single decoded message, borrowing its bytes (including the header) from the
/// buffer it was scanned out of.
#[derive(Copy, Clone, Debug)]
pub(crate) struct RawMessage<'a> {
    pub(crate) bytes: &'a [u8],
}

impl<'a> RawMessage<'a> {
    pub(crate) fn object_id(&self) -> u32 {
        u32::from_ne_bytes(self.bytes[0..4].try_into().unwrap())
    }

    pub(crate) fn opcode(&self) -> u16 {
        u16::from_ne_bytes(self.bytes[4..6].try_into().unwrap())
    }

    pub(crate) fn size(&self) -> u16 {
        u16::from_ne_bytes(self.bytes[6..8].try_into().unwrap())
    }

    pub(crate) fn payload(&self) -> &'a [u8] {
        &self.bytes[HEADER_SIZE..]
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub(crate) enum ScanError {
    #[error("buffer length {0} is not a multiple of 4, the stream is desynchronized")]
    Misaligned(usize),
    #[error("message claims a size of {0} bytes, which is less than the 8-byte header")]
    TooSmall(u16),
    #[error("message claims a size of {0} bytes, which exceeds the {MAX_MESSAGE_SIZE}-byte cap")]
    TooLarge(u16),
    #[error("message claims a size of {0} bytes, which is not a multiple of 4")]
    NotAligned(u16),
    #[error("message claims a size of {need} bytes but only {have} remain in the buffer")]
    Truncated { need: u16, have: usize },
}

/// Walks a byte buffer as a sequence of Wayland wire messages.
///
/// The buffer must have a length that is a multiple of 4; anything else means the
/// stream has desynchronized and scanning cannot safely continue.
#[derive(Debug)]
pub(crate) struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
    poisoned: bool,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Result<Self, ScanError> {
        if buf.len() % 4 != 0 {
            return Err(ScanError::Misaligned(buf.len()));
        }
        Ok(Self {
            buf,
            pos: 0,
            poisoned: false,
        })
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<RawMessage<'a>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned || self.pos == self.buf.len() {
            return None;
        }
        let remaining = self.buf.len() - self.pos;
        if remaining < HEADER_SIZE {
            self.poisoned = true;
            return Some(Err(ScanError::Truncated {
                need: HEADER_SIZE as u16,
                have: remaining,
            }));
        }
        let size = u16::from_ne_bytes(
            self.buf[self.pos + 6..self.pos + 8]
                .try_into()
                .unwrap(),
        );
        if (size as usize) < HEADER_SIZE {
            self.poisoned = true;
            return Some(Err(ScanError::TooSmall(size)));
        }
        if size as usize > MAX_MESSAGE_SIZE {
            self.poisoned = true;
            return Some(Err(ScanError::TooLarge(size)));
        }
        if size % 4 != 0 {
            self.poisoned = true;
            return Some(Err(ScanError::NotAligned(size)));
        }
        if size as usize > remaining {
            self.poisoned = true;
            return Some(Err(ScanError::Truncated {
                need: size,
                have: remaining,
            }));
        }
        let start = self.pos;
        let end = start + size as usize;
        self.pos = end;
        Some(Ok(RawMessage {
            bytes: &self.buf[start..end],
        }))
    }
}

/// A decoded `wl_registry.bind` request.
pub(crate) struct BindRequest<'a> {
    #[expect(dead_code, reason = "kept for completeness of the decoded request")]
    pub(crate) name: u32,
    pub(crate) interface: &'a str,
    #[expect(dead_code, reason = "kept for completeness of the decoded request")]
    pub(crate) version: u32,
    pub(crate) new_id: u32,
}

/// Decodes a `wl_registry.bind` payload: `name, interface_len, interface (padded,
/// nul-terminated), version, new_id`.
///
/// Returns `None` if the payload is too short to contain a well-formed request; this is
/// treated as "nothing to learn from this message", not a fatal error, since the scanner
/// has already validated the outer message framing.
pub(crate) fn decode_bind(payload: &[u8]) -> Option<BindRequest<'_>> {
    let name = read_u32(payload, 0)?;
    let interface_len = read_u32(payload, 4)? as usize;
    let interface_start: usize = 8;
    let interface_end = interface_start.checked_add(interface_len)?;
    let interface_bytes = payload.get(interface_start..interface_end)?;
    let interface = std::str::from_utf8(interface_bytes.strip_suffix(b"\0")?).ok()?;
    let padded_len = (interface_len + 3) / 4 * 4;
    let version_offset = interface_start + padded_len;
    let version = read_u32(payload, version_offset)?;
    let new_id = read_u32(payload, version_offset + 4)?;
    Some(BindRequest {
        name,
        interface,
        version,
        new_id,
    })
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_ne_bytes(bytes.try_into().unwrap()))
}
