//! The downstream listening socket the automation proxy exposes to its child.

use {
    std::{
        env,
        io,
        os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd},
    },
    thiserror::Error,
    uapi::{Errno, c, sockaddr_none_mut},
};


const XDG_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";

/// The fixed display name the proxy publishes to its child, chosen to avoid
/// colliding with a real compositor's `wayland-0`/`wayland-1`.
pub(crate) const DOWNSTREAM_DISPLAY: &str = "wayland-2";

#[derive(Debug, Error)]
pub(crate) enum AcceptorError {
    #[error("{XDG_RUNTIME_DIR} is not set")]
    XrdNotSet,
    #[error("could not create a socket")]
    CreateSocket(#[source] io::Error),
    #[error("{XDG_RUNTIME_DIR} ({0:?}) is too long to form a unix socket address")]
    XrdTooLong(String),
    #[error("could not stat the existing socket at {0}")]
    Stat(String, #[source] io::Error),
    #[error("could not remove a stale socket at {0}")]
    Unlink(String, #[source] io::Error),
    #[error("could not bind the socket to an address")]
    Bind(#[source] io::Error),
    #[error("could not start listening for incoming connections")]
    Listen(#[source] io::Error),
    #[error("could not accept a new connection")]
    Accept(#[source] io::Error),
}

/// A file-system acceptor for the single downstream Wayland connection this proxy
/// serves. Unlike a real compositor, it never tries more than one address: this
/// proxy has exactly one child, so a collision means something is already wrong.
pub(crate) struct Acceptor {
    socket: OwnedFd,
    path: String,
}

impl Acceptor {
    pub(crate) fn bind() -> Result<Self, AcceptorError> {
        let xrd = env::var(XDG_RUNTIME_DIR).map_err(|_| AcceptorError::XrdNotSet)?;
        let path = format!("{xrd}/{DOWNSTREAM_DISPLAY}");
        let socket = uapi::socket(
            c::AF_UNIX,
            c::SOCK_STREAM | c::SOCK_NONBLOCK | c::SOCK_CLOEXEC,
            0,
        )
        .map_err(|e| AcceptorError::CreateSocket(e.into()))?;
        let mut addr: c::sockaddr_un = uapi::pod_zeroed();
        addr.sun_family = c::AF_UNIX as _;
        if path.len() + 1 > addr.sun_path.len() {
            return Err(AcceptorError::XrdTooLong(xrd));
        }
        match uapi::lstat(&*path) {
            Ok(_) => uapi::unlink(&*path).map_err(|e| AcceptorError::Unlink(path.clone(), e.into()))?,
            Err(Errno(c::ENOENT)) => {}
            Err(e) => return Err(AcceptorError::Stat(path, e.into())),
        }
        let sun_path = uapi::as_bytes_mut(&mut addr.sun_path[..]);
        sun_path[..path.len()].copy_from_slice(path.as_bytes());
        sun_path[path.len()] = 0;
        uapi::bind(socket.as_raw_fd(), &addr).map_err(|e| AcceptorError::Bind(e.into()))?;
        uapi::listen(socket.as_raw_fd(), 1).map_err(|e| AcceptorError::Listen(e.into()))?;
        Ok(Self {
            socket: socket.into(),
            path,
        })
    }

    pub(crate) fn accept(&self) -> Result<Option<OwnedFd>, AcceptorError> {
        loop {
            match uapi::accept4(
                self.socket.as_raw_fd(),
                sockaddr_none_mut(),
                c::SOCK_NONBLOCK | c::SOCK_CLOEXEC,
            ) {
                Ok((fd, _)) => return Ok(Some(fd.into())),
                Err(Errno(c::EAGAIN)) => return Ok(None),
                Err(Errno(c::EINTR)) => {}
                Err(e) => return Err(AcceptorError::Accept(e.into())),
            }
        }
    }
}

impl AsFd for Acceptor {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        let _ = uapi::unlink(&*self.path);
    }
}
