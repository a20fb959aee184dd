//! Runs the system utilities that manage accounts and ownership on the host.

use anyhow::{bail, Context};
use shlex::Quoter;
use std::ffi::OsStr;
use std::process::{Command, ExitStatus};
use tracing::debug;

/// Builds a user-friendly, shell-quoted representation of a command for logs and errors.
fn describe<C: AsRef<OsStr>, A: AsRef<OsStr>>(cmd: C, args: &[A]) -> String {
    let mut components = Vec::with_capacity(args.len() + 1);
    components.push(cmd.as_ref().to_string_lossy().to_string());
    components.extend(
        args.iter()
            .map(|a| a.as_ref().to_string_lossy().to_string()),
    );

    // Try to use shlex to properly quote the string. If that fails, naively join with spaces.
    match Quoter::new().join(components.iter().map(|s| &s[..])) {
        Ok(s) => s,
        Err(_) => components.join(" "),
    }
}

/// Turns an unsuccessful exit status into an error naming the command.
fn check_status(status: ExitStatus, command: impl FnOnce() -> String) -> anyhow::Result<()> {
    if !status.success() {
        let error = match status.code() {
            Some(i) => format!("exit code {i}"),
            None => "error".to_string(),
        };
        bail!("command exited with {error}: {}", command());
    }
    Ok(())
}

/// Runs a command as a new process and waits for it to complete.
///
/// Standard input, output, and error are inherited from the parent process.
///
/// # Errors
///
/// Returns an error if the command cannot be run for any reason or exits with an error.
///
/// # Example
///
/// ```
/// use sysadmin::client;
///
/// assert!(client::run("true", &[] as &[&str]).is_ok());
/// assert!(client::run("false", &[] as &[&str]).is_err());
/// ```
pub fn run<C: AsRef<OsStr>, A: AsRef<OsStr>>(cmd: C, args: &[A]) -> anyhow::Result<()> {
    let command = || describe(&cmd, args);
    debug!(command = %command(), "running");

    let status = Command::new(&cmd)
        .args(args)
        .status()
        .with_context(|| format!("failed to start command: {}", command()))?;
    check_status(status, command)
}

/// Runs a command and returns its standard output.
///
/// Standard error is captured and included in the error if the command fails.
///
/// # Errors
///
/// Returns an error if the command cannot be run, exits with an error, or prints something other
/// than UTF-8.
pub fn output<C: AsRef<OsStr>, A: AsRef<OsStr>>(cmd: C, args: &[A]) -> anyhow::Result<String> {
    let command = || describe(&cmd, args);
    debug!(command = %command(), "running");

    let output = Command::new(&cmd)
        .args(args)
        .output()
        .with_context(|| format!("failed to start command: {}", command()))?;
    check_status(output.status, &command).with_context(|| {
        format!(
            "captured stderr: {}",
            String::from_utf8_lossy(&output.stderr).trim_end()
        )
    })?;

    String::from_utf8(output.stdout)
        .with_context(|| format!("command printed non-UTF-8 output: {}", command()))
}

#[cfg(test)]
mod test;
