//! Spawns the target program as a child of the proxy.

use {
    std::{
        fs::File,
        io,
        os::unix::fs::OpenOptionsExt,
        process::{Child, Command, Stdio},
    },
    thiserror::Error,
};

const STDOUT_LOG: &str = "out.log";
const STDERR_LOG: &str = "err.log";

#[derive(Debug, Error)]
pub(crate) enum ChildError {
    #[error("could not open /dev/null for the child's standard input")]
    OpenDevNull(#[source] io::Error),
    #[error("could not open {0} for the child's standard output/error")]
    OpenLog(&'static str, #[source] io::Error),
    #[error("could not spawn the child process")]
    Spawn(#[source] io::Error),
}

/// Spawns `command` with `WAYLAND_DISPLAY` overridden to `display`, stdin from
/// `/dev/null`, and stdout/stderr redirected to truncated log files. The listening
/// and upstream sockets are `SOCK_CLOEXEC`, so the child never inherits them; no
/// manual descriptor cleanup between fork and exec is needed.
pub(crate) fn spawn(command: &[String], display: &str) -> Result<Child, ChildError> {
    let (program, args) = command
        .split_first()
        .expect("the command line parser requires at least one argument");
    let stdin = File::open("/dev/null").map_err(ChildError::OpenDevNull)?;
    let stdout = open_log(STDOUT_LOG)?;
    let stderr = open_log(STDERR_LOG)?;
    Command::new(program)
        .args(args)
        .env("WAYLAND_DISPLAY", display)
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(ChildError::Spawn)
}

fn open_log(name: &'static str) -> Result<File, ChildError> {
    File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(name)
        .map_err(|e| ChildError::OpenLog(name, e))
}
