//! The relay core: the event loop that ties the acceptor, the two endpoints, the
//! object tracker, the event log and the signal source together.

use {
    crate::{
        acceptor::{Acceptor, AcceptorError},
        child::{self, ChildError},
        endpoint::{Endpoint, EndpointError},
        eventlog::{CaptureLog, EventLogError, ReplayLog},
        mode::Mode,
        poll::{MAX_EVENTS, PollError, PollEvent, Poller},
        signal::{SignalError, SignalSource},
        tracker::ObjectTracker,
        trans::{RecvOutcome, TransError},
        wire::{MAX_MESSAGE_SIZE, ScanError, Scanner},
    },
    std::{
        os::fd::{AsFd, AsRawFd, RawFd},
        path::Path,
        process::Child,
        time::Instant,
    },
    thiserror::Error,
};

const EVENTS_LOG_PATH: &str = "events.bin";

const ID_LISTEN: u64 = 0;
const ID_CLIENT: u64 = 1;
const ID_UPSTREAM: u64 = 2;
const ID_SIGNAL: u64 = 3;

#[derive(Debug, Error)]
pub(crate) enum RelayError {
    #[error(transparent)]
    Acceptor(#[from] AcceptorError),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    EventLog(#[from] EventLogError),
    #[error(transparent)]
    Child(#[from] ChildError),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Trans(#[from] TransError),
    #[error("received a malformed Wayland message")]
    Scan(#[from] ScanError),
}

enum PeerState {
    Open,
    Closed,
}

struct Relay {
    poller: Poller,
    acceptor: Acceptor,
    signal_source: SignalSource,
    mode: Mode,
    tracker: ObjectTracker,
    capture_log: Option<CaptureLog>,
    replay_log: Option<ReplayLog>,
    client: Option<Endpoint>,
    upstream: Option<Endpoint>,
    t0: Option<Instant>,
    // Held for its lifetime's sake: the proxy never waits on its child, relying on the
    // OS to reap it when the proxy itself exits.
    _child: Child,
}

/// Runs the proxy to completion. Returns `Ok(())` on any clean termination (interrupt,
/// or either peer closing its connection); returns `Err` on a fatal I/O or
/// protocol-framing error.
pub(crate) fn run(mode: Mode, command: Vec<String>) -> Result<(), RelayError> {
    let acceptor = Acceptor::bind()?;
    let poller = Poller::new()?;
    poller.register(ID_LISTEN, acceptor.as_fd())?;
    let signal_source = SignalSource::install()?;
    poller.register(ID_SIGNAL, signal_source.as_fd())?;

    let capture_log = match mode {
        Mode::Capture => Some(CaptureLog::create(Path::new(EVENTS_LOG_PATH))?),
        _ => None,
    };
    let replay_log = match mode {
        Mode::Replay => Some(ReplayLog::open(Path::new(EVENTS_LOG_PATH))?),
        _ => None,
    };

    let child = child::spawn(&command, crate::acceptor::DOWNSTREAM_DISPLAY)?;

    let mut relay = Relay {
        poller,
        acceptor,
        signal_source,
        mode,
        tracker: ObjectTracker::default(),
        capture_log,
        replay_log,
        client: None,
        upstream: None,
        t0: None,
        _child: child,
    };
    relay.run_loop()
}

impl Relay {
    fn run_loop(&mut self) -> Result<(), RelayError> {
        let mut events = [PollEvent::default(); MAX_EVENTS];
        loop {
            let timeout_ms = self.compute_timeout_ms();
            let n = self.poller.wait(timeout_ms, &mut events)?;
            let now = Instant::now();

            let mut signal_ready = false;
            let mut listen_ready = false;
            let mut client_ready = false;
            let mut upstream_ready = false;
            for ev in &events[..n] {
                match ev.id {
                    ID_SIGNAL => signal_ready = true,
                    ID_LISTEN => listen_ready = true,
                    ID_CLIENT => client_ready = true,
                    ID_UPSTREAM => upstream_ready = true,
                    _ => {}
                }
            }

            if signal_ready && self.signal_source.drain()? {
                log::info!("received interrupt, shutting down");
                return Ok(());
            }

            if listen_ready {
                self.accept(now)?;
            }

            if client_ready
                && matches!(
                    self.forward_client_to_compositor()?,
                    PeerState::Closed
                )
            {
                self.disconnect();
                return Ok(());
            }

            if upstream_ready
                && matches!(
                    self.forward_compositor_to_client(now)?,
                    PeerState::Closed
                )
            {
                self.disconnect();
                return Ok(());
            }

            if self.mode.is_replay() && self.client.is_some() {
                self.inject_due(now)?;
            }
        }
    }

    /// `-1` blocks indefinitely; otherwise the number of milliseconds until the next
    /// logged event is due for injection.
    fn compute_timeout_ms(&self) -> i32 {
        if !self.mode.is_replay() {
            return -1;
        }
        let (Some(t0), Some(replay_log)) = (self.t0, &self.replay_log) else {
            return -1;
        };
        let Some(t1) = replay_log.next_due() else {
            return -1;
        };
        let elapsed = Instant::now().duration_since(t0);
        let remaining = t1.saturating_sub(elapsed);
        remaining.as_millis().min(i32::MAX as u128) as i32
    }

    fn accept(&mut self, now: Instant) -> Result<(), RelayError> {
        if self.client.is_some() {
            log::warn!("rejecting a second connection attempt; this proxy serves one client");
            let _ = self.acceptor.accept()?;
            return Ok(());
        }
        let Some(client_fd) = self.acceptor.accept()? else {
            return Ok(());
        };
        let upstream = Endpoint::connect_upstream()?;
        self.poller.register(ID_CLIENT, client_fd.as_fd())?;
        self.poller.register(ID_UPSTREAM, upstream.as_fd())?;
        self.client = Some(Endpoint::from_fd(client_fd));
        self.upstream = Some(upstream);
        self.t0 = Some(now);
        log::info!("client connected");
        Ok(())
    }

    fn forward_client_to_compositor(&mut self) -> Result<PeerState, RelayError> {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let outcome = self.client.as_ref().unwrap().recv(&mut buf)?;
        let (len, fds) = match outcome {
            RecvOutcome::Closed => return Ok(PeerState::Closed),
            RecvOutcome::WouldBlock => return Ok(PeerState::Open),
            RecvOutcome::Data { len, fds } => (len, fds),
        };
        let bytes = &buf[..len];
        for msg in Scanner::new(bytes)? {
            self.tracker.observe_request(&msg?);
        }
        let raw_fds: Vec<RawFd> = fds.iter().map(|f| f.as_raw_fd()).collect();
        self.upstream.as_ref().unwrap().send(bytes, &raw_fds)?;
        // The kernel has already duplicated these into the upstream connection; the
        // proxy never retains client-side file descriptors.
        drop(fds);
        Ok(PeerState::Open)
    }

    fn forward_compositor_to_client(&mut self, now: Instant) -> Result<PeerState, RelayError> {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let outcome = self.upstream.as_ref().unwrap().recv(&mut buf)?;
        let (len, fds) = match outcome {
            RecvOutcome::Closed => return Ok(PeerState::Closed),
            RecvOutcome::WouldBlock => return Ok(PeerState::Open),
            RecvOutcome::Data { len, fds } => (len, fds),
        };
        let bytes = &buf[..len];
        let t0 = self
            .t0
            .expect("upstream only exists after accept, which always sets t0");

        let mut out = [0u8; MAX_MESSAGE_SIZE];
        let (out_len, captured) = filter_batch(&self.tracker, self.mode, bytes, &mut out)?;
        if self.mode.is_capture() {
            let dt = now.duration_since(t0);
            for frame in captured {
                self.capture_log.as_mut().unwrap().append(dt, frame)?;
            }
        }

        if out_len > 0 {
            let raw_fds: Vec<RawFd> = fds.iter().map(|f| f.as_raw_fd()).collect();
            self.client.as_ref().unwrap().send(&out[..out_len], &raw_fds)?;
        }
        drop(fds);
        Ok(PeerState::Open)
    }

    fn inject_due(&mut self, now: Instant) -> Result<(), RelayError> {
        let Some(t0) = self.t0 else { return Ok(()) };
        let elapsed = now.duration_since(t0);
        loop {
            let Some(replay_log) = &self.replay_log else {
                return Ok(());
            };
            let Some(t1) = replay_log.next_due() else {
                self.mode = Mode::Idle;
                return Ok(());
            };
            if t1 > elapsed {
                return Ok(());
            }
            let frame = self.replay_log.as_mut().unwrap().take_frame()?;
            let Some(frame) = frame else {
                self.mode = Mode::Idle;
                return Ok(());
            };
            self.client.as_ref().unwrap().send(&frame, &[])?;
        }
    }

    fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = self.poller.unregister(client.as_fd());
        }
        if let Some(upstream) = self.upstream.take() {
            let _ = self.poller.unregister(upstream.as_fd());
        }
    }
}

/// Splits a compositor→client batch into what still goes to the client (`out`, its
/// length returned) and what this mode should log (`captured`, in order). A message is
/// withheld from the client only when it is both a policy target and the current mode
/// is `Replay`; a message is captured only when it is both a policy target and the
/// current mode is `Capture`. The two never overlap, but neither implies the other.
fn filter_batch<'a>(
    tracker: &ObjectTracker,
    mode: Mode,
    bytes: &'a [u8],
    out: &mut [u8; MAX_MESSAGE_SIZE],
) -> Result<(usize, Vec<&'a [u8]>), ScanError> {
    let mut out_len = 0;
    let mut captured = Vec::new();
    for msg in Scanner::new(bytes)? {
        let msg = msg?;
        let policy_target = tracker.is_policy_target(&msg);
        if policy_target && mode.is_capture() {
            captured.push(msg.bytes);
        }
        if !(policy_target && mode.is_replay()) {
            out[out_len..out_len + msg.bytes.len()].copy_from_slice(msg.bytes);
            out_len += msg.bytes.len();
        }
    }
    Ok((out_len, captured))
}

#[cfg(test)]
mod tests;
