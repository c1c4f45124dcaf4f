//! Child-process helpers shared by the initializer, background tasks and launcher.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Exit code reported for a finished process.
///
/// A process killed by a signal is reported as `128 + signal`, the shell
/// convention.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

/// Build a command with detached stdin and inherited output streams.
pub fn command(program: &str, args: &[String], port: Option<u16>) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(false);
    if let Some(port) = port {
        cmd.env("PORT", port.to_string());
    }
    cmd
}
