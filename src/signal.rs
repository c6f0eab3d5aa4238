//! Interrupt handling: `SIGINT`/`SIGTERM` are blocked and delivered through a
//! dedicated, non-blocking `signalfd` registered in the same poll set as the relay's
//! socket descriptors, rather than an asynchronous signal handler and a global flag.

use {
    nix::sys::{
        signal::{SigSet, Signal},
        signalfd::{SfdFlags, SignalFd},
    },
    std::os::fd::{AsFd, AsRawFd, BorrowedFd},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub(crate) enum SignalError {
    #[error("could not block SIGINT/SIGTERM")]
    Block(#[source] nix::Error),
    #[error("could not create a signalfd")]
    CreateSignalFd(#[source] nix::Error),
    #[error("could not read from the signalfd")]
    Read(#[source] nix::Error),
}

pub(crate) struct SignalSource {
    fd: SignalFd,
}

impl SignalSource {
    pub(crate) fn install() -> Result<Self, SignalError> {
        let mut mask = SigSet::empty();
        mask.add(Signal::SIGINT);
        mask.add(Signal::SIGTERM);
        mask.thread_block().map_err(SignalError::Block)?;
        let fd = SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
            .map_err(SignalError::CreateSignalFd)?;
        Ok(Self { fd })
    }

    /// Drains pending signals. Returns `true` if an interrupt was observed; tolerates
    /// spurious wakeups by returning `false` when nothing was actually pending.
    pub(crate) fn drain(&mut self) -> Result<bool, SignalError> {
        let mut interrupted = false;
        loop {
            match self.fd.read_signal() {
                Ok(Some(_)) => interrupted = true,
                Ok(None) => break,
                Err(e) => return Err(SignalError::Read(e)),
            }
        }
        Ok(interrupted)
    }
}

impl AsFd for SignalSource {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the borrow is tied to &self, so the signalfd outlives it.
        unsafe { BorrowedFd::borrow_raw(self.fd.as_raw_fd()) }
    }
}
