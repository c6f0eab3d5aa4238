//! Low-level, non-blocking datagram I/O for the Wayland Unix-domain sockets:
//! `recvmsg`/`sendmsg` carrying `SCM_RIGHTS` ancillary file descriptors.

use {
    isnt::std_1::primitive::IsntSliceExt,
    smallvec::SmallVec,
    std::{
        io,
        mem::MaybeUninit,
        os::fd::{FromRawFd, OwnedFd, RawFd},
        slice,
    },
    thiserror::Error,
    uapi::{Errno, Msghdr, MsghdrMut, c, sockaddr_none_mut, sockaddr_none_ref},
};

/// The largest number of file descriptors the proxy will accept with a single
/// datagram. Matches the control buffer size below.
const MAX_FDS: usize = 28;

#[derive(Debug, Error)]
pub(crate) enum TransError {
    #[error("failed to read from socket")]
    ReadFromSocket(#[source] io::Error),
    #[error("failed to write to socket")]
    WriteToSocket(#[source] io::Error),
    #[error("the connection is closed")]
    Closed,
    #[error("a send wrote only {wrote} of {total} bytes, which this proxy treats as fatal")]
    PartialWrite { wrote: usize, total: usize },
}

pub(crate) enum RecvOutcome {
    /// The peer performed an orderly close (zero-length read).
    Closed,
    /// Nothing is currently available; the caller should wait for readiness again.
    WouldBlock,
    /// `len` bytes were read into the caller's buffer, along with any ancillary file
    /// descriptors that arrived with them.
    Data { len: usize, fds: Vec<OwnedFd> },
}

/// Reads one `recvmsg` worth of data (up to `buf.len()` bytes) plus any ancillary file
/// descriptors into `buf`.
pub(crate) fn recv(socket: RawFd, buf: &mut [u8]) -> Result<RecvOutcome, TransError> {
    let mut iovec = buf;
    let mut control_buf = [0u8; 128];
    let mut header = MsghdrMut {
        iov: slice::from_mut(&mut iovec),
        control: Some(&mut control_buf),
        name: sockaddr_none_mut(),
        flags: 0,
    };
    let (init, _, mut control) =
        match uapi::recvmsg(socket, &mut header, c::MSG_CMSG_CLOEXEC | c::MSG_DONTWAIT) {
            Ok(r) => r,
            Err(e) if e.0 == c::EAGAIN => return Ok(RecvOutcome::WouldBlock),
            Err(e) => {
                return Err(TransError::ReadFromSocket(io::Error::from_raw_os_error(
                    e.0,
                )));
            }
        };
    let len = init.len();
    if len == 0 {
        return Ok(RecvOutcome::Closed);
    }
    let mut fds = Vec::new();
    while control.is_not_empty() {
        let (_, hdr, data) = uapi::cmsg_read(&mut control).unwrap();
        if hdr.cmsg_level != c::SOL_SOCKET || hdr.cmsg_type != c::SCM_RIGHTS {
            continue;
        }
        for fd in uapi::pod_iter::<RawFd, _>(data).unwrap() {
            // SAFETY: the kernel guarantees that fd is valid and was freshly
            // duplicated into this process by recvmsg.
            fds.push(unsafe { OwnedFd::from_raw_fd(fd) });
        }
    }
    Ok(RecvOutcome::Data { len, fds })
}

/// Writes `bytes` as a single datagram, optionally carrying `fds` as ancillary data. A
/// partial write is treated as fatal: Wayland messages never exceed the per-message
/// cap, so a short write at these sizes indicates a socket condition this proxy does
/// not attempt to recover from.
pub(crate) fn send(socket: RawFd, bytes: &[u8], fds: &[RawFd]) -> Result<(), TransError> {
    assert!(fds.len() <= MAX_FDS, "more fds than a single datagram can carry");
    let mut control_buf = SmallVec::<[MaybeUninit<u8>; 128]>::new();
    let mut control = None;
    if !fds.is_empty() {
        let data_len = size_of::<RawFd>() * fds.len();
        let cmsg_space = uapi::cmsg_space(data_len);
        control_buf.reserve_exact(cmsg_space);
        // SAFETY: control_buf contains only MaybeUninit elements.
        unsafe {
            control_buf.set_len(cmsg_space);
        }
        let hdr = c::cmsghdr {
            cmsg_len: 0,
            cmsg_level: c::SOL_SOCKET,
            cmsg_type: c::SCM_RIGHTS,
        };
        let mut buf = &mut control_buf[..];
        uapi::cmsg_write(&mut buf, hdr, fds).unwrap();
        control = Some(&control_buf[..]);
    }
    let msghdr = Msghdr {
        iov: slice::from_ref(&bytes),
        control,
        name: sockaddr_none_ref(),
    };
    match uapi::sendmsg(socket, &msghdr, c::MSG_NOSIGNAL | c::MSG_DONTWAIT) {
        Ok(n) if n == bytes.len() => Ok(()),
        Ok(n) => Err(TransError::PartialWrite {
            wrote: n,
            total: bytes.len(),
        }),
        Err(Errno(c::ECONNRESET)) => Err(TransError::Closed),
        Err(Errno(c::EPIPE)) => Err(TransError::Closed),
        Err(e) => Err(TransError::WriteToSocket(io::Error::from_raw_os_error(e.0))),
    }
}
