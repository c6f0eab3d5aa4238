//! Command-line interface: `wayland-automation-proxy [-c|-r|-h] [--] <command> [args...]`.

use {crate::mode::Mode, clap::Parser};

#[derive(Parser, Debug)]
#[command(
    name = "wayland-automation-proxy",
    about = "Record-and-replay automation proxy for the Wayland display protocol"
)]
struct Args {
    /// Record user-input events from the compositor (default).
    #[arg(short = 'c', conflicts_with = "replay")]
    capture: bool,
    /// Suppress real user-input events and inject the previously captured stream at
    /// their original relative timings.
    #[arg(short = 'r')]
    replay: bool,
    /// The program to launch under the proxy, followed by its own arguments.
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,
}

pub(crate) struct Invocation {
    pub(crate) mode: Mode,
    pub(crate) command: Vec<String>,
}

/// Parses `argv`. `-h`/`--help` prints usage and returns `Err(0)`; a bad or missing
/// argument prints a diagnostic and returns `Err(1)` — the exact two non-success exit
/// codes this command line documents.
pub(crate) fn parse() -> Result<Invocation, u8> {
    match Args::try_parse() {
        Ok(args) => Ok(Invocation {
            mode: if args.replay { Mode::Replay } else { Mode::Capture },
            command: args.command,
        }),
        Err(e) if e.kind() == clap::error::ErrorKind::DisplayHelp => {
            let _ = e.print();
            Err(0)
        }
        Err(e) => {
            let _ = e.print();
            Err(1)
        }
    }
}

#[cfg(test)]
mod tests;
