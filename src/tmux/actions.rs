//! tmux control actions.
//!
//! [`build_tmux_args`] maps an action name and JSON payload to a tmux argv
//! without running anything; [`TmuxExecutor`] runs it. Failures carry a
//! coarse machine-readable [`ActionError::code`] for API responses while the
//! process output stays available for server-side logs.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use super::{
    command::{self, CommandError, COMMAND_TIMEOUT},
    ActionExecutor,
};

pub const CODE_FAILED: &str = "TMUX_ACTION_FAILED";
pub const CODE_TIMEOUT: &str = "TMUX_ACTION_TIMEOUT";
pub const CODE_INVALID_PAYLOAD: &str = "INVALID_ACTION_PAYLOAD";
pub const CODE_UNSUPPORTED: &str = "UNSUPPORTED_ACTION";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ActionOutput {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("tmux exited with {returncode:?}")]
    Failed {
        returncode: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("tmux command timed out")]
    Timeout,
    #[error("{0}")]
    InvalidPayload(String),
    #[error("unsupported action: {0}")]
    Unsupported(String),
}

impl ActionError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Failed { .. } => CODE_FAILED,
            Self::Timeout => CODE_TIMEOUT,
            Self::InvalidPayload(_) => CODE_INVALID_PAYLOAD,
            Self::Unsupported(_) => CODE_UNSUPPORTED,
        }
    }

    /// Captured process output, for logging only.
    #[must_use]
    pub fn output(&self) -> (&str, &str) {
        match self {
            Self::Failed { stdout, stderr, .. } => (stdout, stderr),
            _ => ("", ""),
        }
    }
}

/// Text field of the payload: strings are trimmed, numbers and booleans are
/// rendered, anything else is empty.
fn text(payload: &Value, key: &str) -> String {
    match payload.get(key) {
        Some(Value::String(value)) => value.trim().to_string(),
        Some(value @ (Value::Number(_) | Value::Bool(_))) => value.to_string(),
        _ => String::new(),
    }
}

fn required(payload: &Value, key: &str) -> Result<String, ActionError> {
    let value = text(payload, key);
    if value.is_empty() {
        Err(ActionError::InvalidPayload(format!("{key} is required")))
    } else {
        Ok(value)
    }
}

fn targeted(subcommand: &str, payload: &Value, key: &str) -> Result<Vec<String>, ActionError> {
    Ok(vec![
        subcommand.to_string(),
        "-t".to_string(),
        required(payload, key)?,
    ])
}

fn send_keys(payload: &Value) -> Result<Vec<String>, ActionError> {
    let target = required(payload, "target_pane")?;
    let keys: Vec<String> = match payload.get("keys") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(value) => value.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(value)) => vec![value.clone()],
        None | Some(Value::Null) => vec![String::new()],
        Some(other) => vec![other.to_string()],
    };

    // ["-l", text] sends text literally; -l must precede the target.
    if keys.first().is_some_and(|first| first == "-l") {
        let literal = keys.get(1).cloned().unwrap_or_default();
        return Ok(vec![
            "send-keys".to_string(),
            "-l".to_string(),
            "-t".to_string(),
            target,
            literal,
        ]);
    }

    let mut args = vec!["send-keys".to_string(), "-t".to_string(), target];
    args.extend(keys);
    Ok(args)
}

fn new_window(payload: &Value) -> Vec<String> {
    let mut args = vec!["new-window".to_string()];
    for (flag, key) in [("-t", "target_session"), ("-n", "window_name")] {
        let value = text(payload, key);
        if !value.is_empty() {
            args.extend([flag.to_string(), value]);
        }
    }
    let command = text(payload, "command");
    if !command.is_empty() {
        args.push(command);
    }
    args
}

fn split_window(payload: &Value) -> Vec<String> {
    let direction = if text(payload, "direction") == "horizontal" {
        "-h"
    } else {
        "-v"
    };
    let mut args = vec!["split-window".to_string(), direction.to_string()];
    for (flag, key) in [("-t", "target_pane"), ("-p", "percentage")] {
        let value = text(payload, key);
        if !value.is_empty() {
            args.extend([flag.to_string(), value]);
        }
    }
    let command = text(payload, "command");
    if !command.is_empty() {
        args.push(command);
    }
    args
}

/// tmux arguments (without the `tmux` program) for `action`.
///
/// # Errors
/// [`ActionError::Unsupported`] for unknown actions and
/// [`ActionError::InvalidPayload`] when a required target is missing.
pub fn build_tmux_args(action: &str, payload: &Value) -> Result<Vec<String>, ActionError> {
    match action {
        "send_keys" => send_keys(payload),
        "select_pane" => targeted("select-pane", payload, "target_pane"),
        "select_window" => targeted("select-window", payload, "target_window"),
        "switch_client" => targeted("switch-client", payload, "target_session"),
        "kill_pane" => targeted("kill-pane", payload, "target_pane"),
        "kill_window" => targeted("kill-window", payload, "target_window"),
        "kill_session" => targeted("kill-session", payload, "target_session"),
        "new_window" => Ok(new_window(payload)),
        "split_window" => Ok(split_window(payload)),
        other => Err(ActionError::Unsupported(other.to_string())),
    }
}

/// Executes actions against the local tmux server.
#[derive(Clone, Debug, Default)]
pub struct TmuxExecutor;

impl TmuxExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionExecutor for TmuxExecutor {
    #[instrument(skip(self, payload))]
    async fn execute(&self, action: &str, payload: &Value) -> Result<ActionOutput, ActionError> {
        let args = build_tmux_args(action, payload)?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = match command::run("tmux", &args, COMMAND_TIMEOUT).await {
            Ok(output) => output,
            Err(CommandError::Timeout { .. }) => return Err(ActionError::Timeout),
            Err(err) => {
                return Err(ActionError::Failed {
                    returncode: None,
                    stdout: String::new(),
                    stderr: err.to_string(),
                })
            }
        };

        if !output.success() {
            return Err(ActionError::Failed {
                returncode: output.exit_code,
                stdout: output.stdout.trim().to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(ActionOutput {
            ok: true,
            stdout: output.stdout.trim().to_string(),
            stderr: output.stderr.trim().to_string(),
            returncode: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn args(action: &str, payload: Value) -> Result<Vec<String>, ActionError> {
        build_tmux_args(action, &payload)
    }

    #[test]
    fn targeted_actions_require_target() -> Result<()> {
        assert_eq!(
            args("select_pane", json!({"target_pane": " %1 "}))?,
            ["select-pane", "-t", "%1"]
        );
        assert_eq!(
            args("kill_session", json!({"target_session": "work"}))?,
            ["kill-session", "-t", "work"]
        );

        let err = args("kill_window", json!({})).unwrap_err();
        assert_eq!(err.code(), CODE_INVALID_PAYLOAD);
        assert_eq!(err.to_string(), "target_window is required");
        Ok(())
    }

    #[test]
    fn send_keys_variants() -> Result<()> {
        assert_eq!(
            args("send_keys", json!({"target_pane": "%1", "keys": ["ls", "Enter"]}))?,
            ["send-keys", "-t", "%1", "ls", "Enter"]
        );
        assert_eq!(
            args("send_keys", json!({"target_pane": "%1", "keys": "C-c"}))?,
            ["send-keys", "-t", "%1", "C-c"]
        );
        assert_eq!(
            args("send_keys", json!({"target_pane": "%1", "keys": ["-l", "-rf /"]}))?,
            ["send-keys", "-l", "-t", "%1", "-rf /"]
        );
        assert_eq!(
            args("send_keys", json!({"target_pane": "%1", "keys": ["-l"]}))?,
            ["send-keys", "-l", "-t", "%1", ""]
        );
        assert!(args("send_keys", json!({"keys": "x"})).is_err());
        Ok(())
    }

    #[test]
    fn new_window_optional_fields() -> Result<()> {
        assert_eq!(args("new_window", json!({}))?, ["new-window"]);
        assert_eq!(
            args(
                "new_window",
                json!({"target_session": "work", "window_name": "logs", "command": "tail -f x"})
            )?,
            ["new-window", "-t", "work", "-n", "logs", "tail -f x"]
        );
        Ok(())
    }

    #[test]
    fn split_window_direction_and_percentage() -> Result<()> {
        assert_eq!(args("split_window", json!({}))?, ["split-window", "-v"]);
        assert_eq!(
            args(
                "split_window",
                json!({"direction": "horizontal", "target_pane": "%2", "percentage": 30})
            )?,
            ["split-window", "-h", "-t", "%2", "-p", "30"]
        );
        Ok(())
    }

    #[test]
    fn unknown_action_is_unsupported() {
        let err = args("kill_server", json!({})).unwrap_err();
        assert_eq!(err.code(), CODE_UNSUPPORTED);
    }

    #[test]
    fn error_codes() {
        assert_eq!(ActionError::Timeout.code(), CODE_TIMEOUT);
        let failed = ActionError::Failed {
            returncode: Some(1),
            stdout: "out".into(),
            stderr: "can't find pane".into(),
        };
        assert_eq!(failed.code(), CODE_FAILED);
        assert_eq!(failed.output(), ("out", "can't find pane"));
    }
}
