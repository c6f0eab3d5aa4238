//! A thin `epoll` wrapper multiplexing the listening socket, the client and upstream
//! endpoints, and the signal descriptor.

use {
    std::{
        io,
        os::fd::{AsRawFd, BorrowedFd, OwnedFd},
    },
    thiserror::Error,
    uapi::{Errno, c},
};


#[derive(Debug, Error)]
pub(crate) enum PollError {
    #[error("could not create epoll fd")]
    Create(#[source] io::Error),
    #[error("could not read epoll events")]
    Read(#[source] io::Error),
    #[error("could not register a file descriptor with epoll")]
    Add(#[source] io::Error),
    #[error("could not unregister a file descriptor from epoll")]
    Remove(#[source] io::Error),
}

/// The proxy never registers more than four descriptors at once: the listening
/// socket, the client, the upstream connection and the signalfd.
pub(crate) const MAX_EVENTS: usize = 4;

const READABLE: u32 = c::EPOLLIN as u32;

#[derive(Copy, Clone, Default)]
pub(crate) struct PollEvent {
    pub(crate) id: u64,
}

pub(crate) struct Poller {
    epoll: OwnedFd,
}

impl Poller {
    pub(crate) fn new() -> Result<Self, PollError> {
        let epoll =
            uapi::epoll_create1(c::EPOLL_CLOEXEC).map_err(|e| PollError::Create(e.into()))?;
        Ok(Self { epoll: epoll.into() })
    }

    pub(crate) fn register(&self, id: u64, fd: BorrowedFd<'_>) -> Result<(), PollError> {
        let event = c::epoll_event {
            events: READABLE,
            u64: id,
        };
        uapi::epoll_ctl(
            self.epoll.as_raw_fd(),
            c::EPOLL_CTL_ADD,
            fd.as_raw_fd(),
            Some(&event),
        )
        .map_err(|e| PollError::Add(e.into()))
    }

    pub(crate) fn unregister(&self, fd: BorrowedFd<'_>) -> Result<(), PollError> {
        uapi::epoll_ctl(self.epoll.as_raw_fd(), c::EPOLL_CTL_DEL, fd.as_raw_fd(), None)
            .map_err(|e| PollError::Remove(e.into()))
    }

    /// Waits for readiness on any registered descriptor. `timeout_ms` of `-1` blocks
    /// indefinitely; this is the scheduling primitive REPLAY uses to wake up exactly
    /// when the next logged event is due.
    pub(crate) fn wait(
        &self,
        timeout_ms: i32,
        events: &mut [PollEvent; MAX_EVENTS],
    ) -> Result<usize, PollError> {
        loop {
            let mut raw = [c::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];
            let n = match uapi::epoll_wait(self.epoll.as_raw_fd(), &mut raw, timeout_ms) {
                Ok(n) => n,
                Err(Errno(c::EINTR)) => continue,
                Err(e) => return Err(PollError::Read(e.into())),
            };
            for i in 0..n {
                events[i] = PollEvent { id: raw[i].u64 };
            }
            return Ok(n);
        }
    }
}
