//! External command execution.
//!
//! Every external tool (git, the code generator, the copy command, the
//! compiler, the test-build script) goes through these helpers so a failure
//! always names the command line that failed.

use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Render a command as a single shell-like line for diagnostics.
pub fn render(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command with inherited stdio and fail on a non-zero exit.
pub fn run(cmd: &mut Command) -> Result<()> {
    let command = render(cmd);
    tracing::debug!("running: {}", command);

    let status = cmd.status().map_err(|source| Error::Spawn {
        command: command.clone(),
        source,
    })?;

    if !status.success() {
        return Err(Error::CommandFailed { command, status });
    }
    Ok(())
}

/// Run a command and return its trimmed stdout.
///
/// Stderr is captured and logged at warn level when the command fails.
pub fn capture(cmd: &mut Command) -> Result<String> {
    let command = render(cmd);
    tracing::debug!("capturing: {}", command);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|source| Error::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!("{} failed: {}", command, stderr.trim());
        return Err(Error::CommandFailed {
            command,
            status: output.status,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
