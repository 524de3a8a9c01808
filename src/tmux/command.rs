//! Subprocess runner with a bounded wait.

use std::{io, process::Stdio, time::Duration};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Upper bound for any tmux/ps/lsof invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{program} not found")]
    NotFound { program: String },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} timed out after {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

/// Run `program` with `args`, capturing stdout/stderr. The child is killed
/// when the timeout elapses.
///
/// # Errors
/// Returns [`CommandError`] when the program is missing, cannot be spawned or
/// does not finish within `timeout`. A non-zero exit is not an error.
pub async fn run(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    debug!(program, ?args, "running command");
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => CommandError::NotFound {
                program: program.to_string(),
            },
            _ => CommandError::Spawn {
                program: program.to_string(),
                source,
            },
        })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| CommandError::Timeout {
            program: program.to_string(),
            timeout,
        })?
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Trimmed stdout of a successful run, or an empty string on any failure.
pub async fn capture(program: &str, args: &[&str]) -> String {
    match run(program, args, COMMAND_TIMEOUT).await {
        Ok(output) if output.success() => output.stdout.trim().to_string(),
        Ok(output) => {
            debug!(program, exit_code = ?output.exit_code, "command failed");
            String::new()
        }
        Err(err) => {
            debug!("{err}");
            String::new()
        }
    }
}
