//! A single non-blocking connected endpoint: either the client or the compositor
//! side of the relay.

use {
    crate::trans::{self, RecvOutcome, TransError},
    std::{
        env,
        io,
        os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd},
    },
    thiserror::Error,
    uapi::c,
};

#[derive(Debug, Error)]
pub(crate) enum EndpointError {
    #[error("{0} is not set")]
    EnvNotSet(&'static str),
    #[error("{0} ({1:?}) is too long to form a unix socket address")]
    AddressTooLong(&'static str, String),
    #[error("could not create the upstream socket")]
    CreateSocket(#[source] io::Error),
    #[error("could not connect to the compositor")]
    Connect(#[source] io::Error),
}

/// One side of the relay: either the client connected through [`Acceptor`](crate::acceptor::Acceptor)
/// or the upstream connection dialed to the real compositor.
pub(crate) struct Endpoint {
    socket: OwnedFd,
}

impl Endpoint {
    pub(crate) fn from_fd(socket: OwnedFd) -> Self {
        Self { socket }
    }

    /// Connects a fresh non-blocking socket to `$XDG_RUNTIME_DIR/$WAYLAND_DISPLAY`,
    /// the real compositor this proxy sits in front of.
    pub(crate) fn connect_upstream() -> Result<Self, EndpointError> {
        let xrd = env::var("XDG_RUNTIME_DIR").map_err(|_| EndpointError::EnvNotSet("XDG_RUNTIME_DIR"))?;
        let display =
            env::var("WAYLAND_DISPLAY").map_err(|_| EndpointError::EnvNotSet("WAYLAND_DISPLAY"))?;
        let path = format!("{xrd}/{display}");
        let socket = uapi::socket(
            c::AF_UNIX,
            c::SOCK_STREAM | c::SOCK_NONBLOCK | c::SOCK_CLOEXEC,
            0,
        )
        .map_err(|e| EndpointError::CreateSocket(e.into()))?;
        let mut addr: c::sockaddr_un = uapi::pod_zeroed();
        addr.sun_family = c::AF_UNIX as _;
        if path.len() + 1 > addr.sun_path.len() {
            return Err(EndpointError::AddressTooLong("XDG_RUNTIME_DIR", xrd));
        }
        let sun_path = uapi::as_bytes_mut(&mut addr.sun_path[..]);
        sun_path[..path.len()].copy_from_slice(path.as_bytes());
        sun_path[path.len()] = 0;
        uapi::connect(socket.as_raw_fd(), &addr).map_err(|e| EndpointError::Connect(e.into()))?;
        Ok(Self { socket: socket.into() })
    }

    pub(crate) fn recv(&self, buf: &mut [u8]) -> Result<RecvOutcome, TransError> {
        trans::recv(self.socket.as_raw_fd(), buf)
    }

    pub(crate) fn send(&self, bytes: &[u8], fds: &[RawFd]) -> Result<(), TransError> {
        trans::send(self.socket.as_raw_fd(), bytes, fds)
    }
}

impl AsFd for Endpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}

#[cfg(test)]
mod tests;
