//! tmux and host network state, plus the tmux control actions.
//!
//! HTTP handlers only see the [`Collector`] and [`ActionExecutor`] traits;
//! the system implementations shell out to `tmux`, `ps` and `lsof`.

pub mod actions;
pub mod collector;
pub mod command;
pub mod network;
pub mod redact;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use actions::{build_tmux_args, ActionError, ActionOutput, TmuxExecutor};
pub use collector::SystemCollector;

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TmuxState {
    pub available: bool,
    pub running: bool,
    pub sessions: Vec<Session>,
    pub error: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub window_count: u32,
    pub attached: bool,
    pub windows: Vec<Window>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: String,
    pub index: u32,
    pub name: String,
    pub active: bool,
    pub pane_count: u32,
    pub panes: Vec<Pane>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Pane {
    pub id: String,
    pub index: u32,
    pub active: bool,
    pub pid: String,
    pub current_command: String,
    pub current_path: String,
    pub title: String,
    pub process: PaneProcess,
}

/// Serializes as `{}` when no process details are known.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PaneProcess {
    #[serde(flatten)]
    pub details: Option<ProcessDetails>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProcessDetails {
    pub pid: String,
    pub ppid: String,
    pub user: String,
    pub elapsed: String,
    pub command: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PaneDetail {
    pub session: PaneSession,
    pub window: PaneWindow,
    pub pane: Pane,
    pub output: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PaneSession {
    pub name: String,
    pub attached: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PaneWindow {
    pub id: String,
    pub index: u32,
    pub name: String,
    pub active: bool,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkState {
    pub listening_servers: Vec<ListeningServer>,
    pub ssh_connections: Vec<SshConnection>,
    pub ssh_tunnels: Vec<SshTunnel>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ListeningServer {
    pub command: String,
    pub pid: String,
    pub user: String,
    pub address: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SshConnection {
    pub pid: String,
    pub ppid: String,
    pub user: String,
    pub command: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SshTunnel {
    pub pid: String,
    pub user: String,
    pub command: String,
    pub kind: String,
}

/// Read-only view of tmux and the host network.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn tmux_state(&self) -> TmuxState;
    async fn network_state(&self) -> NetworkState;
    /// `None` when the pane id is blank or no running pane matches it.
    async fn pane_detail(&self, pane_id: &str) -> Option<PaneDetail>;
}

/// Runs a named control action with a JSON payload.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &str, payload: &Value) -> Result<ActionOutput, ActionError>;
}

impl TmuxState {
    /// Locate a pane by id together with its session and window.
    #[must_use]
    pub fn find_pane(&self, pane_id: &str) -> Option<(&Session, &Window, &Pane)> {
        self.sessions.iter().find_map(|session| {
            session.windows.iter().find_map(|window| {
                window
                    .panes
                    .iter()
                    .find(|pane| pane.id == pane_id)
                    .map(|pane| (session, window, pane))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn empty_process_serializes_as_object() -> Result<()> {
        let value = serde_json::to_value(PaneProcess::default())?;
        assert_eq!(value, serde_json::json!({}));

        let value = serde_json::to_value(PaneProcess {
            details: Some(ProcessDetails {
                pid: "1".into(),
                ppid: "0".into(),
                user: "root".into(),
                elapsed: "01:00".into(),
                command: "bash".into(),
            }),
        })?;
        assert_eq!(value["command"], "bash");
        Ok(())
    }
}
