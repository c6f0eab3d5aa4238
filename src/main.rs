//! Record-and-replay automation proxy for the Wayland display protocol.
//!
//! Interposes between a single Wayland client and a compositor. In CAPTURE mode it
//! transparently forwards all traffic while logging user-input events and their
//! timing; in REPLAY it suppresses real input events and injects the recorded stream
//! at the original relative timings instead.

mod acceptor;
mod child;
mod cli;
mod endpoint;
mod eventlog;
mod mode;
mod poll;
mod relay;
mod signal;
mod tracker;
mod trans;
mod wire;

use {
    error_reporter::Report,
    log::LevelFilter,
    std::{env, process::ExitCode},
};

fn main() -> ExitCode {
    // The proxy-specific variable takes priority over the generic `RUST_LOG`, but
    // either is honored so this binary behaves like any other env_logger consumer.
    let filter = env::var("WAYLAND_AUTOMATION_PROXY_DEBUG")
        .or_else(|_| env::var("RUST_LOG"))
        .ok();
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    if let Some(filter) = filter {
        builder.parse_filters(&filter);
    }
    builder.init();

    let invocation = match cli::parse() {
        Ok(invocation) => invocation,
        Err(0) => return ExitCode::SUCCESS,
        Err(_) => return ExitCode::FAILURE,
    };

    match relay::run(invocation.mode, invocation.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", Report::new(e));
            ExitCode::FAILURE
        }
    }
}
